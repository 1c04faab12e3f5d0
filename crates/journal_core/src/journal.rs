//! Explicitly constructed bundle of every journal service.
//!
//! # Invariants
//! - All services of one `Journal` share the same store.
//! - Nothing is global; callers own the `Journal` and pass it around.

use crate::backup::BackupService;
use crate::config::CoreConfig;
use crate::repo::store::{SqliteStore, Store};
use crate::repo::RepoError;
use crate::service::campaign_service::CampaignService;
use crate::service::character_service::CharacterService;
use crate::service::entry_service::EntryService;
use crate::service::{ServiceError, ServiceResult};
use log::info;
use std::sync::Arc;
use std::time::Instant;

/// Stored row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub campaigns: u64,
    pub characters: u64,
    pub entries: u64,
}

pub struct Journal<S: Store> {
    store: Arc<S>,
    campaigns: CampaignService<S>,
    characters: CharacterService<S>,
    entries: EntryService<S>,
    backup: BackupService<S>,
}

impl Journal<SqliteStore> {
    /// Opens (and migrates) the database named by `config`.
    ///
    /// # Errors
    /// - `StorageUnavailable` when the file cannot be opened or is not a database.
    /// - `MigrationFailed` when the schema cannot be brought up to date.
    pub fn open(config: &CoreConfig) -> ServiceResult<Self> {
        let started_at = Instant::now();
        let store = SqliteStore::open(&config.db_path).map_err(ServiceError::from)?;
        info!(
            "event=journal_open module=core status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(Self::with_store(Arc::new(store)))
    }
}

impl<S: Store> Journal<S> {
    pub fn with_store(store: Arc<S>) -> Self {
        Self {
            campaigns: CampaignService::new(Arc::clone(&store)),
            characters: CharacterService::new(Arc::clone(&store)),
            entries: EntryService::new(Arc::clone(&store)),
            backup: BackupService::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn campaigns(&self) -> &CampaignService<S> {
        &self.campaigns
    }

    pub fn characters(&self) -> &CharacterService<S> {
        &self.characters
    }

    pub fn entries(&self) -> &EntryService<S> {
        &self.entries
    }

    pub fn backup(&self) -> &BackupService<S> {
        &self.backup
    }

    /// Shared store, for callers that need raw repository access.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Counts every entity kind in one consistent read.
    pub fn summary(&self) -> ServiceResult<JournalSummary> {
        let summary = self.store.read(|repos| -> Result<JournalSummary, RepoError> {
            Ok(JournalSummary {
                campaigns: repos.campaigns().count()?,
                characters: repos.characters().count()?,
                entries: repos.entries().count()?,
            })
        })?;
        Ok(summary)
    }
}
