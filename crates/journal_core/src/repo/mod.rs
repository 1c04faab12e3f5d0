//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define one data access contract per entity type.
//! - Isolate SQLite query details from use-case orchestration.
//! - Provide an in-memory double so use cases can be tested without SQLite.
//!
//! # Invariants
//! - Repositories never run business validation; use cases do.
//! - Storage constraint failures surface as `Conflict`, missing rows as
//!   `NotFound`.
//! - Multi-statement writes rely on the enclosing `Store::write` transaction.

use crate::db::DbError;
use crate::model::EntityKind;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod campaign_repo;
pub mod character_repo;
pub mod entry_repo;
pub mod memory;
pub mod query;
mod sql;
pub mod store;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    NotFound {
        kind: EntityKind,
        id: Uuid,
    },
    /// Write rejected by a storage constraint (foreign key, duplicate id).
    Conflict {
        kind: EntityKind,
        message: String,
    },
    Db(DbError),
    /// Persisted row cannot be converted into a domain entity.
    InvalidData(String),
}

impl RepoError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Conflict { kind, message } => write!(f, "{kind} write conflict: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
