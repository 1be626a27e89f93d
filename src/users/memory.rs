use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, UserError};
use crate::users::repo::UserStore;
use crate::users::repo_types::User;

/// In-process store with the same id and email uniqueness rules as the
/// `users` table. Used for tests and for embedding without Postgres.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(rows: &HashMap<Uuid, User>, email: &str, except: Uuid) -> bool {
    rows.values().any(|u| u.id != except && u.email == email)
}

fn conflict(email: &str) -> UserError {
    UserError::Conflict(format!("email `{email}` already in use"))
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> Result<User> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&user.id) {
            return Err(UserError::Conflict(format!("id {} already exists", user.id)));
        }
        if email_taken(&rows, &user.email, user.id) {
            return Err(conflict(&user.email));
        }
        rows.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut rows = self.rows.write().await;
        if email_taken(&rows, &user.email, user.id) {
            return Err(conflict(&user.email));
        }
        let stored = rows.get_mut(&user.id).ok_or(UserError::NotFound(user.id))?;
        stored.apply_changes(user);
        stored.updated_at = stored.updated_at.max(user.updated_at);
        Ok(stored.clone())
    }

    async fn save_many(&self, users: &[User]) -> Result<()> {
        let mut rows = self.rows.write().await;
        for user in users {
            if email_taken(&rows, &user.email, user.id) {
                return Err(conflict(&user.email));
            }
            if let Some(stored) = rows.get_mut(&user.id) {
                stored.apply_changes(user);
                stored.updated_at = stored.updated_at.max(user.updated_at);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }

    async fn delete_matching(&self, email_marker: &str, name_prefix: &str) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, u| {
            !(u.email.contains(email_marker) || u.first_name.starts_with(name_prefix))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn close(&self) {}
}
