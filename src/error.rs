use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = UserError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user with id {0} not found")]
    NotFound(Uuid),

    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("user service is closed")]
    Closed,

    #[error(transparent)]
    Store(sqlx::Error),
}

impl From<sqlx::Error> for UserError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let what = db
                    .constraint()
                    .map(|c| format!("unique constraint `{c}` violated"))
                    .unwrap_or_else(|| db.message().to_string());
                UserError::Conflict(what)
            }
            _ => UserError::Store(err),
        }
    }
}
