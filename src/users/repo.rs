use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, UserError};
use crate::users::repo_types::{User, UserRow};

/// Persistence seam for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// Inserts `user` exactly as given and returns the stored row.
    async fn insert(&self, user: &User) -> Result<User>;
    /// Writes every mutable column for `user.id`; `updated_at` only moves forward.
    async fn save(&self, user: &User) -> Result<User>;
    /// Writes all records in a single commit.
    async fn save_many(&self, users: &[User]) -> Result<()>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn delete_matching(&self, email_marker: &str, name_prefix: &str) -> Result<u64>;
    async fn close(&self);
}

pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>> {
    rows.into_iter()
        .map(|r| User::try_from(r).map_err(UserError::from))
        .collect()
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, phone, role,
                   is_active, email_verified, created_at, updated_at
            FROM users
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        into_users(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, phone, role,
                   is_active, email_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert(&self, user: &User) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, phone, role,
                               is_active, email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, email, password_hash, first_name, last_name, phone, role,
                      is_active, email_verified, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let row = update_query(user)
            .fetch_optional(&self.db)
            .await?
            .ok_or(UserError::NotFound(user.id))?;
        Ok(User::try_from(row)?)
    }

    async fn save_many(&self, users: &[User]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for user in users {
            update_query(user).fetch_optional(&mut *tx).await?;
        }
        tx.commit().await?;
        debug!(count = users.len(), "batch committed");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_matching(&self, email_marker: &str, name_prefix: &str) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM users
             WHERE strpos(email, $1) > 0
                OR left(first_name, char_length($2)) = $2
            "#,
        )
        .bind(email_marker)
        .bind(name_prefix)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

fn update_query(
    user: &User,
) -> sqlx::query::QueryAs<'_, sqlx::Postgres, UserRow, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
           SET email = $2,
               first_name = $3,
               last_name = $4,
               phone = $5,
               role = $6,
               is_active = $7,
               email_verified = $8,
               updated_at = GREATEST(users.updated_at, $9)
         WHERE id = $1
        RETURNING id, email, password_hash, first_name, last_name, phone, role,
                  is_active, email_verified, created_at, updated_at
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.phone)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(user.email_verified)
    .bind(user.updated_at)
}
