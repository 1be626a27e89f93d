//! Data access for e-commerce user records backed by PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod users;

pub use config::AppConfig;
pub use error::UserError;
pub use users::{User, UserRole, UserService};
