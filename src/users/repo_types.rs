use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Role of a user. Stored by name so reordering variants never changes data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
    Vendor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "Customer",
            UserRole::Admin => "Admin",
            UserRole::Vendor => "Vendor",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown user role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Customer" => Ok(UserRole::Customer),
            "Admin" => Ok(UserRole::Admin),
            "Vendor" => Ok(UserRole::Vendor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// User record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: String, // opaque, hashed elsewhere
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            email: String::new(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            role: UserRole::Customer,
            is_active: true,
            email_verified: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{} ({})", self.full_name(), self.email)
    }

    /// Copies the caller-mutable fields from `src`.
    /// `id`, `created_at`, `updated_at` and `password_hash` are left alone.
    pub(crate) fn apply_changes(&mut self, src: &User) {
        self.email = src.email.clone();
        self.first_name = src.first_name.clone();
        self.last_name = src.last_name.clone();
        self.phone = src.phone.clone();
        self.role = src.role;
        self.is_active = src.is_active;
        self.email_verified = src.email_verified;
    }
}

/// Row as stored in `users`; `role` is kept as text.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role = r
            .role
            .parse::<UserRole>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Self {
            id: r.id,
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            phone: r.phone,
            role,
            is_active: r.is_active,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_new_customer() {
        let u = User::default();
        assert_eq!(u.role, UserRole::Customer);
        assert!(u.is_active);
        assert!(!u.email_verified);
        assert!(u.phone.is_none());
        assert!(u.first_name.is_empty() && u.last_name.is_empty());
    }

    #[test]
    fn derived_names_follow_current_fields() {
        let mut u = User::new("jane@shop.io", "Jane", "Doe");
        assert_eq!(u.full_name(), "Jane Doe");
        assert_eq!(u.display_name(), "Jane Doe (jane@shop.io)");

        u.first_name = "Janet".into();
        u.email = "janet@shop.io".into();
        assert_eq!(u.display_name(), "Janet Doe (janet@shop.io)");
    }

    #[test]
    fn role_is_stored_by_name() {
        for role in [UserRole::Customer, UserRole::Admin, UserRole::Vendor] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!(UserRole::Vendor.as_str(), "Vendor");
        assert!("1".parse::<UserRole>().is_err());
        assert!("admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn row_with_unknown_role_fails_to_decode() {
        let row = UserRow {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            password_hash: String::new(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
            role: "Superuser".into(),
            is_active: true,
            email_verified: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let err = User::try_from(row).unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
    }

    #[test]
    fn serialization_hides_password_hash() {
        let mut u = User::new("x@y.com", "X", "Y");
        u.password_hash = "argon2-secret".into();
        u.role = UserRole::Admin;
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("argon2-secret"));
        assert!(json.contains("\"Admin\""));
    }

    #[test]
    fn apply_changes_keeps_identity_fields() {
        let mut stored = User::new("old@shop.io", "Old", "Name");
        stored.id = Uuid::new_v4();
        stored.password_hash = "hash".into();
        let mut incoming = User::new("new@shop.io", "New", "Person");
        incoming.id = Uuid::new_v4();
        incoming.password_hash = "other".into();
        incoming.role = UserRole::Vendor;
        incoming.phone = Some("555-0123".into());
        incoming.is_active = false;
        incoming.email_verified = true;

        let id = stored.id;
        stored.apply_changes(&incoming);
        assert_eq!(stored.id, id);
        assert_eq!(stored.password_hash, "hash");
        assert_eq!(stored.email, "new@shop.io");
        assert_eq!(stored.role, UserRole::Vendor);
        assert_eq!(stored.phone.as_deref(), Some("555-0123"));
        assert!(!stored.is_active);
        assert!(stored.email_verified);
    }
}
