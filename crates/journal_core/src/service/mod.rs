//! Journal use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into user-facing operations.
//! - Enforce rules that span repositories (references, cascades).
//! - Translate storage failures into the `ServiceError` taxonomy.
//!
//! # Invariants
//! - Every mutation runs inside one `Store::write` scope, so a rejected
//!   operation never leaves a partial write behind.
//! - Validation and not-found outcomes are returned, never logged as errors.

use crate::db::DbError;
use crate::model::campaign::CampaignId;
use crate::model::character::CharacterId;
use crate::model::timestamp::Timestamp;
use crate::model::validation::{ReferenceLookup, ValidationError};
use crate::model::EntityKind;
use crate::repo::store::RepositorySet;
use crate::repo::RepoError;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub mod campaign_service;
pub mod character_service;
pub mod entry_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by every use-case operation.
#[derive(Debug)]
pub enum ServiceError {
    /// Input breaks one or more rules; nothing was written.
    Validation(ValidationError),
    NotFound {
        kind: EntityKind,
        id: Uuid,
    },
    /// Write blocked by a storage constraint.
    Conflict {
        kind: EntityKind,
        message: String,
    },
    /// Cascading delete aborted and rolled back.
    DeleteFailed {
        kind: EntityKind,
        id: Uuid,
        reason: RepoError,
    },
    /// File-system or engine failure; retryable after remediation.
    StorageUnavailable(RepoError),
    /// Schema could not be brought to the version this build expects.
    MigrationFailed(DbError),
    /// Backup document was written by a newer schema.
    IncompatibleSchema {
        document_version: u64,
        supported_version: u32,
    },
}

impl ServiceError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::DeleteFailed { .. } => "delete_failed",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::MigrationFailed(_) => "migration_failed",
            Self::IncompatibleSchema { .. } => "incompatible_schema",
        }
    }

    /// True for outcomes the caller fixes by changing its input.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::Conflict { .. }
                | Self::IncompatibleSchema { .. }
        )
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Conflict { kind, message } => write!(f, "{kind} conflict: {message}"),
            Self::DeleteFailed { kind, id, reason } => {
                write!(f, "failed to delete {kind} {id}: {reason}")
            }
            Self::StorageUnavailable(err) => write!(f, "storage unavailable: {err}"),
            Self::MigrationFailed(err) => write!(f, "{err}"),
            Self::IncompatibleSchema {
                document_version,
                supported_version,
            } => write!(
                f,
                "document schema version {document_version} is newer than supported version {supported_version}"
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::DeleteFailed { reason, .. } => Some(reason),
            Self::StorageUnavailable(err) => Some(err),
            Self::MigrationFailed(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict { .. } | Self::IncompatibleSchema { .. } => {
                None
            }
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Conflict { kind, message } => Self::Conflict { kind, message },
            RepoError::Db(err) => Self::from(err),
            other @ RepoError::InvalidData(_) => Self::StorageUnavailable(other),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        match value {
            err @ (DbError::MigrationFailed { .. }
            | DbError::UnsupportedSchemaVersion { .. }
            | DbError::InvalidMigrationPlan(_)) => Self::MigrationFailed(err),
            other => Self::StorageUnavailable(RepoError::Db(other)),
        }
    }
}

/// Half-open `updated_at` window: `from <= updated_at < until`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

impl DateRange {
    pub fn since(from: Timestamp) -> Self {
        Self {
            from: Some(from),
            until: None,
        }
    }

    pub fn between(from: Timestamp, until: Timestamp) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    pub fn contains(&self, value: Timestamp) -> bool {
        self.from.map_or(true, |from| value >= from) && self.until.map_or(true, |until| value < until)
    }
}

/// Keeps items whose `updated_at` falls inside `range`, preserving order.
pub(crate) fn retain_in_range<T>(
    items: Vec<T>,
    range: Option<DateRange>,
    updated_at: impl Fn(&T) -> Timestamp,
) -> Vec<T> {
    match range {
        Some(range) => items
            .into_iter()
            .filter(|item| range.contains(updated_at(item)))
            .collect(),
        None => items,
    }
}

/// Resolves references through the repositories of the current scope.
pub(crate) struct RepoLookup<'a> {
    repos: &'a dyn RepositorySet,
}

impl<'a> RepoLookup<'a> {
    pub(crate) fn new(repos: &'a dyn RepositorySet) -> Self {
        Self { repos }
    }
}

impl ReferenceLookup for RepoLookup<'_> {
    type Error = ServiceError;

    fn campaign_exists(&self, id: CampaignId) -> Result<bool, Self::Error> {
        Ok(self.repos.campaigns().exists(id)?)
    }

    fn character_campaign(&self, id: CharacterId) -> Result<Option<CampaignId>, Self::Error> {
        match self.repos.characters().get(id) {
            Ok(character) => Ok(Some(character.campaign_id)),
            Err(RepoError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Emits the outcome line of one use-case call and passes `result` through.
pub(crate) fn log_outcome<T>(
    event: &'static str,
    id: Option<Uuid>,
    started_at: Instant,
    result: ServiceResult<T>,
) -> ServiceResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    let id = id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match &result {
        Ok(_) => debug!("event={event} module=service status=ok id={id} duration_ms={duration_ms}"),
        Err(err) if err.is_expected() => info!(
            "event={event} module=service status=rejected id={id} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
        Err(err) => error!(
            "event={event} module=service status=error id={id} duration_ms={duration_ms} error_code={} error={}",
            err.code(),
            err
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{DateRange, ServiceError};
    use crate::db::DbError;
    use crate::model::timestamp::from_millis;
    use crate::model::EntityKind;
    use crate::repo::RepoError;
    use uuid::Uuid;

    #[test]
    fn date_range_is_half_open() {
        let start = from_millis(1_000).unwrap();
        let end = from_millis(2_000).unwrap();
        let range = DateRange::between(start, end);
        assert!(range.contains(start));
        assert!(range.contains(from_millis(1_999).unwrap()));
        assert!(!range.contains(end));
        assert!(DateRange::default().contains(from_millis(0).unwrap()));
    }

    #[test]
    fn repo_errors_map_to_service_taxonomy() {
        let id = Uuid::new_v4();
        let not_found = ServiceError::from(RepoError::not_found(EntityKind::Entry, id));
        assert!(matches!(not_found, ServiceError::NotFound { kind: EntityKind::Entry, .. }));
        assert!(not_found.is_expected());

        let migration = ServiceError::from(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 3,
        });
        assert_eq!(migration.code(), "migration_failed");
        assert!(!migration.is_expected());

        let invalid = ServiceError::from(RepoError::InvalidData("bad uuid".to_string()));
        assert_eq!(invalid.code(), "storage_unavailable");
    }
}
