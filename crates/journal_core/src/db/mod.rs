//! SQLite storage engine and schema migration entry points.
//!
//! # Responsibility
//! - Own the single database connection of one journal installation.
//! - Apply schema migrations in deterministic order before any data access.
//! - Provide atomic write transactions and consistent read scopes.
//!
//! # Invariants
//! - Schema version is tracked in the single-row `schema_version` table and
//!   mirrored to `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Only one transaction is active at a time per `Database`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::Database;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// File cannot be opened/created or is not a usable SQLite database.
    Unavailable {
        path: PathBuf,
        cause: rusqlite::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One migration step failed and was rolled back.
    MigrationFailed {
        from_version: u32,
        to_version: u32,
        cause: rusqlite::Error,
    },
    /// Supplied migration list is not strictly increasing from version 1.
    InvalidMigrationPlan(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Unavailable { path, cause } => {
                write!(f, "database `{}` is unavailable: {cause}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MigrationFailed {
                from_version,
                to_version,
                cause,
            } => write!(
                f,
                "migration from schema version {from_version} to {to_version} failed: {cause}"
            ),
            Self::InvalidMigrationPlan(message) => write!(f, "invalid migration plan: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Unavailable { cause, .. } => Some(cause),
            Self::MigrationFailed { cause, .. } => Some(cause),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidMigrationPlan(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
