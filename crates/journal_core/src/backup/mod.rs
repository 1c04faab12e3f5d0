//! JSON backup export and restore.
//!
//! # Responsibility
//! - Snapshot every campaign, character and entry into one document.
//! - Restore a document by replacing or merging with stored data.
//!
//! # Invariants
//! - Export lists entities in creation order.
//! - An import either applies completely or leaves storage untouched.
//! - Merge never overwrites an entity whose id is already stored.
//! - Documents from a newer schema are rejected before any write.

use crate::db::migrations::latest_version;
use crate::model::validation::{
    validate_campaign, validate_character, validate_entry, ValidationError, Violation,
};
use crate::repo::query::{CampaignQuery, CharacterQuery, EntryQuery, Sort};
use crate::repo::store::{RepositorySet, Store};
use crate::repo::RepoError;
use crate::service::{log_outcome, RepoLookup, ServiceError, ServiceResult};
use log::info;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

mod document;

pub use document::BackupDocument;

/// How an import treats data already in storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportMode {
    /// Drop all stored data, then load the document.
    #[default]
    Replace,
    /// Keep stored data; add only entities with unknown ids.
    Merge,
}

impl ImportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        }
    }
}

impl Display for ImportMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind outcome counts of one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub inserted: usize,
    /// Entities left alone because their id was already stored (merge only).
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub campaigns: ImportCounts,
    pub characters: ImportCounts,
    pub entries: ImportCounts,
}

impl ImportReport {
    pub fn inserted(&self) -> usize {
        self.campaigns.inserted + self.characters.inserted + self.entries.inserted
    }

    pub fn skipped(&self) -> usize {
        self.campaigns.skipped + self.characters.skipped + self.entries.skipped
    }
}

pub struct BackupService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> BackupService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reads a consistent snapshot of all stored data.
    pub fn export(&self) -> ServiceResult<BackupDocument> {
        let started_at = Instant::now();
        let result = self.store.read(|repos| -> ServiceResult<BackupDocument> {
            Ok(BackupDocument {
                schema_version: latest_version(),
                campaigns: repos.campaigns().list(&CampaignQuery {
                    sort: Sort::creation_order(),
                    ..CampaignQuery::default()
                })?,
                characters: repos.characters().list(&CharacterQuery {
                    sort: Sort::creation_order(),
                    ..CharacterQuery::default()
                })?,
                entries: repos.entries().list(&EntryQuery {
                    sort: Sort::creation_order(),
                    ..EntryQuery::default()
                })?,
            })
        });
        if let Ok(document) = &result {
            info!(
                "event=backup_export module=backup status=ok campaigns={} characters={} entries={} duration_ms={}",
                document.campaigns.len(),
                document.characters.len(),
                document.entries.len(),
                started_at.elapsed().as_millis()
            );
        }
        log_outcome("backup_export", None, started_at, result)
    }

    /// Exports as pretty-printed JSON.
    pub fn export_json(&self) -> ServiceResult<String> {
        let document = self.export()?;
        document.to_json_pretty().map_err(|err| {
            ServiceError::StorageUnavailable(RepoError::InvalidData(format!(
                "backup document cannot be encoded: {err}"
            )))
        })
    }

    /// Loads `document` in one transaction.
    ///
    /// Every violation in the document is reported together; on any
    /// violation nothing is written.
    ///
    /// # Errors
    /// - `IncompatibleSchema` when the document is newer than this build.
    /// - `Validation` with all violations found.
    pub fn import(&self, document: BackupDocument, mode: ImportMode) -> ServiceResult<ImportReport> {
        let started_at = Instant::now();
        let result = self.import_checked(&document, mode);
        if let Ok(report) = &result {
            info!(
                "event=backup_import module=backup status=ok mode={} inserted={} skipped={} duration_ms={}",
                mode,
                report.inserted(),
                report.skipped(),
                started_at.elapsed().as_millis()
            );
        }
        log_outcome("backup_import", None, started_at, result)
    }

    /// Decodes `text` and imports it.
    ///
    /// `schemaVersion` is checked before the entities are decoded, so a
    /// document from a newer build is `IncompatibleSchema` even when this
    /// build cannot read its entities. Any other undecodable text is a
    /// `MalformedDocument` violation.
    pub fn import_json(&self, text: &str, mode: ImportMode) -> ServiceResult<ImportReport> {
        let started_at = Instant::now();
        let decoded = BackupDocument::schema_version_of(text)
            .map_err(ServiceError::from)
            .and_then(ensure_supported)
            .and_then(|()| BackupDocument::from_json(text).map_err(ServiceError::from));
        match decoded {
            Ok(document) => self.import(document, mode),
            Err(err) => log_outcome("backup_import", None, started_at, Err(err)),
        }
    }

    fn import_checked(
        &self,
        document: &BackupDocument,
        mode: ImportMode,
    ) -> ServiceResult<ImportReport> {
        ensure_supported(u64::from(document.schema_version))?;
        if let Some(err) = ValidationError::from_violations(document.duplicate_ids()) {
            return Err(err.into());
        }

        self.store
            .write(|repos| load_document(repos, document, mode))
    }
}

/// Rejects documents written by a newer schema than this build migrates to.
fn ensure_supported(document_version: u64) -> ServiceResult<()> {
    let supported_version = latest_version();
    if document_version > u64::from(supported_version) {
        return Err(ServiceError::IncompatibleSchema {
            document_version,
            supported_version,
        });
    }
    Ok(())
}

fn load_document(
    repos: &dyn RepositorySet,
    document: &BackupDocument,
    mode: ImportMode,
) -> ServiceResult<ImportReport> {
    if mode == ImportMode::Replace {
        repos.entries().delete_all()?;
        repos.characters().delete_all()?;
        repos.campaigns().delete_all()?;
    }

    let merge = mode == ImportMode::Merge;
    let lookup = RepoLookup::new(repos);
    let mut report = ImportReport {
        mode,
        ..ImportReport::default()
    };
    let mut violations = Vec::new();

    for campaign in &document.campaigns {
        if merge && repos.campaigns().exists(campaign.id)? {
            report.campaigns.skipped += 1;
            continue;
        }
        if collect(validate_campaign(campaign).map_err(ServiceError::from), &mut violations)? {
            repos.campaigns().create(campaign)?;
            report.campaigns.inserted += 1;
        }
    }

    for character in &document.characters {
        if merge && repos.characters().exists(character.id)? {
            report.characters.skipped += 1;
            continue;
        }
        if collect(validate_character(character, &lookup), &mut violations)? {
            repos.characters().create(character)?;
            report.characters.inserted += 1;
        }
    }

    for entry in &document.entries {
        if merge && repos.entries().exists(entry.id)? {
            report.entries.skipped += 1;
            continue;
        }
        if collect(validate_entry(entry, &lookup), &mut violations)? {
            repos.entries().create(entry)?;
            report.entries.inserted += 1;
        }
    }

    match ValidationError::from_violations(violations) {
        Some(err) => Err(err.into()),
        None => Ok(report),
    }
}

/// Moves validation failures into `violations`; returns whether the entity is valid.
fn collect(result: ServiceResult<()>, violations: &mut Vec<Violation>) -> ServiceResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ServiceError::Validation(err)) => {
            violations.extend(err.into_violations());
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
