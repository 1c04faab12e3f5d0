//! Core data layer for the campaign journal.
//! This crate is the single source of truth for journal invariants.

pub mod backup;
pub mod config;
pub mod db;
pub mod journal;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use backup::{BackupDocument, BackupService, ImportCounts, ImportMode, ImportReport};
pub use config::CoreConfig;
pub use db::migrations::{latest_version, Migration, MIGRATIONS};
pub use db::{Database, DbError, DbResult};
pub use journal::{Journal, JournalSummary};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::campaign::{Campaign, CampaignId, CampaignPatch, NewCampaign};
pub use model::character::{Character, CharacterId, CharacterPatch, NewCharacter};
pub use model::entry::{EntryId, EntryPatch, JournalEntry, NewEntry};
pub use model::timestamp::Timestamp;
pub use model::validation::{ValidationError, Violation};
pub use model::EntityKind;
pub use repo::memory::MemoryStore;
pub use repo::query::{
    CampaignQuery, CharacterQuery, EntryQuery, Sort, SortDirection, SortField,
};
pub use repo::store::{RepositorySet, SqliteStore, Store};
pub use repo::{RepoError, RepoResult};
pub use service::campaign_service::{CampaignDeletion, CampaignService};
pub use service::character_service::CharacterService;
pub use service::entry_service::{EntryService, SearchQuery};
pub use service::{DateRange, ServiceError, ServiceResult};

/// Minimal health-check API for front ends.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
