//! Transaction scopes over a complete set of repositories.
//!
//! # Responsibility
//! - Hand use cases one repository per entity type, bound to one scope.
//! - Make multi-step writes (cascades, imports) atomic.
//!
//! # Invariants
//! - A `write` closure returning `Err` leaves stored data untouched.
//! - A `read` closure observes committed data only.

use crate::db::{Database, DbError, DbResult};
use crate::repo::campaign_repo::{CampaignRepository, SqliteCampaignRepository};
use crate::repo::character_repo::{CharacterRepository, SqliteCharacterRepository};
use crate::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use crate::repo::RepoError;
use rusqlite::Connection;
use std::path::Path;

/// Repositories sharing one transaction scope.
pub trait RepositorySet {
    fn campaigns(&self) -> &dyn CampaignRepository;
    fn characters(&self) -> &dyn CharacterRepository;
    fn entries(&self) -> &dyn EntryRepository;
}

/// Storage backend able to run closures in read and write scopes.
pub trait Store: Send + Sync {
    /// Runs `f` against committed data.
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>;

    /// Runs `f` atomically; its writes are kept only when it returns `Ok`.
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>;
}

/// [`Store`] backed by a migrated SQLite [`Database`].
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Database::open(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Database::open_in_memory().map(Self::new)
    }
}

impl Store for SqliteStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.db
            .read(|conn| f(&SqliteRepositories::new(conn)).map_err(ScopeError::Inner))
            .map_err(ScopeError::into_inner)
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.db
            .transaction(|tx| f(&SqliteRepositories::new(tx)).map_err(ScopeError::Inner))
            .map_err(ScopeError::into_inner)
    }
}

struct SqliteRepositories<'conn> {
    campaigns: SqliteCampaignRepository<'conn>,
    characters: SqliteCharacterRepository<'conn>,
    entries: SqliteEntryRepository<'conn>,
}

impl<'conn> SqliteRepositories<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            campaigns: SqliteCampaignRepository::new(conn),
            characters: SqliteCharacterRepository::new(conn),
            entries: SqliteEntryRepository::new(conn),
        }
    }
}

impl RepositorySet for SqliteRepositories<'_> {
    fn campaigns(&self) -> &dyn CampaignRepository {
        &self.campaigns
    }

    fn characters(&self) -> &dyn CharacterRepository {
        &self.characters
    }

    fn entries(&self) -> &dyn EntryRepository {
        &self.entries
    }
}

/// Carries either the closure's own error or a scope begin/commit failure.
enum ScopeError<E> {
    Inner(E),
    Db(DbError),
}

impl<E> From<DbError> for ScopeError<E> {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl<E: From<RepoError>> ScopeError<E> {
    fn into_inner(self) -> E {
        match self {
            Self::Inner(err) => err,
            Self::Db(err) => E::from(RepoError::Db(err)),
        }
    }
}
