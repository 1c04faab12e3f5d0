//! Portable JSON backup document.
//!
//! # Invariants
//! - Field names are camelCase; timestamps are RFC 3339 UTC with millisecond
//!   precision.
//! - Missing entity arrays decode as empty; a missing `schemaVersion` is
//!   malformed.
//! - `schemaVersion` is readable on its own, whatever shape the entity arrays
//!   have, so documents from newer builds can be recognized.

use crate::model::campaign::Campaign;
use crate::model::character::Character;
use crate::model::entry::JournalEntry;
use crate::model::validation::{ValidationError, Violation};
use crate::model::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Full snapshot of one journal installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
}

/// Leading part of a document; unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct DocumentHeader {
    #[serde(rename = "schemaVersion")]
    schema_version: u64,
}

impl BackupDocument {
    /// Reads only `schemaVersion`, without decoding any entity.
    pub fn schema_version_of(text: &str) -> Result<u64, ValidationError> {
        serde_json::from_str::<DocumentHeader>(text)
            .map(|header| header.schema_version)
            .map_err(malformed)
    }

    /// Decodes a document; undecodable input is a `MalformedDocument` violation.
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(malformed)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Identifiers appearing more than once within one entity list.
    pub fn duplicate_ids(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        collect_duplicates(
            EntityKind::Campaign,
            self.campaigns.iter().map(|campaign| campaign.id),
            &mut violations,
        );
        collect_duplicates(
            EntityKind::Character,
            self.characters.iter().map(|character| character.id),
            &mut violations,
        );
        collect_duplicates(
            EntityKind::Entry,
            self.entries.iter().map(|entry| entry.id),
            &mut violations,
        );
        violations
    }
}

fn malformed(err: serde_json::Error) -> ValidationError {
    ValidationError::single(Violation::MalformedDocument {
        message: err.to_string(),
    })
}

fn collect_duplicates(
    kind: EntityKind,
    ids: impl Iterator<Item = Uuid>,
    violations: &mut Vec<Violation>,
) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for id in ids {
        if !seen.insert(id) && reported.insert(id) {
            violations.push(Violation::DuplicateId { kind, id });
        }
    }
}
