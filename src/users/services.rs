use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, UserError};
use crate::users::repo::{PgUserStore, UserStore};
use crate::users::repo_types::User;

/// Records whose email contains this marker are test data.
pub const TEST_EMAIL_MARKER: &str = "@test.com";
/// Records whose first name starts with this prefix are test data.
pub const TEST_NAME_PREFIX: &str = "Test";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        warn!(email = %email, "invalid email");
        Err(UserError::InvalidArgument {
            field: "email",
            reason: "invalid email format",
        })
    }
}

/// Current time truncated to the store's microsecond precision.
fn now() -> OffsetDateTime {
    let t = OffsetDateTime::now_utc();
    t.replace_microsecond(t.microsecond()).unwrap_or(t)
}

/// `updated_at` for a record last stamped at `prev`; never goes backwards.
fn touch(prev: OffsetDateTime) -> OffsetDateTime {
    now().max(prev)
}

/// Lifecycle operations for user records.
///
/// Cloning is cheap and every clone shares the same store handle; `close`
/// on any clone closes it for all of them.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    closed: Arc<AtomicBool>,
}

impl UserService {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::with_store(Arc::new(PgUserStore::new(pool)))
    }

    pub fn with_store(store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(UserError::Closed);
        }
        Ok(())
    }

    /// Every record, in storage order.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<User>> {
        self.ensure_open()?;
        let users = self.store.list_all().await?;
        debug!(count = users.len(), "users listed");
        Ok(users)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.ensure_open()?;
        self.store
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Stores a new record. Any id or timestamps on `user` are replaced.
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, mut user: User) -> Result<User> {
        self.ensure_open()?;
        validate_email(&user.email)?;

        let ts = now();
        user.id = Uuid::new_v4();
        user.created_at = ts;
        user.updated_at = ts;

        let created = self.store.insert(&user).await?;
        info!(user_id = %created.id, email = %created.email, "user created");
        Ok(created)
    }

    /// Copies the mutable fields of `user` onto the stored record with the
    /// same id and returns the stored result.
    ///
    /// Fails with [`UserError::NotFound`] when no such record exists.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update(&self, user: &User) -> Result<User> {
        self.ensure_open()?;
        validate_email(&user.email)?;

        let mut existing = self
            .store
            .find_by_id(user.id)
            .await?
            .ok_or(UserError::NotFound(user.id))?;
        existing.apply_changes(user);
        existing.updated_at = touch(existing.updated_at);

        let saved = self.store.save(&existing).await?;
        info!(user_id = %saved.id, "user updated");
        Ok(saved)
    }

    /// Batch form of [`update`](Self::update).
    ///
    /// Unlike `update`, ids with no stored record are skipped without error
    /// and emails are not format-checked. All changes go to the store in one
    /// commit; if that commit fails part of the batch may already be applied.
    #[instrument(skip(self, users), fields(requested = users.len()))]
    pub async fn update_many(&self, users: &[User]) -> Result<()> {
        self.ensure_open()?;

        let mut changed = Vec::with_capacity(users.len());
        for user in users {
            match self.store.find_by_id(user.id).await? {
                Some(mut existing) => {
                    existing.apply_changes(user);
                    existing.updated_at = touch(existing.updated_at);
                    changed.push(existing);
                }
                None => debug!(user_id = %user.id, "skipping missing user in batch"),
            }
        }

        if changed.is_empty() {
            return Ok(());
        }
        self.store.save_many(&changed).await?;
        info!(updated = changed.len(), "users batch updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.ensure_open()?;
        if !self.store.delete(id).await? {
            return Err(UserError::NotFound(id));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Removes test records (see [`TEST_EMAIL_MARKER`] and
    /// [`TEST_NAME_PREFIX`]). No environment guard: callers must keep this
    /// away from production data.
    #[instrument(skip(self))]
    pub async fn clear_test_data(&self) -> Result<u64> {
        self.ensure_open()?;
        let removed = self
            .store
            .delete_matching(TEST_EMAIL_MARKER, TEST_NAME_PREFIX)
            .await?;
        info!(removed, "test users cleared");
        Ok(removed)
    }

    /// Releases the store handle. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.store.close().await;
        info!("user service closed");
    }
}
