//! Field and cross-entity validation rules.
//!
//! # Responsibility
//! - Check candidate entities and report every violated rule at once.
//! - Resolve references only through a caller-supplied [`ReferenceLookup`].
//!
//! # Invariants
//! - Validation performs no I/O besides lookup calls.
//! - A returned `ValidationError` always holds at least one violation.

use crate::model::campaign::{Campaign, CampaignId};
use crate::model::character::{Character, CharacterId};
use crate::model::entry::JournalEntry;
use crate::model::text::{normalize_name, normalize_tag};
use crate::model::timestamp::{format_timestamp, Timestamp};
use crate::model::EntityKind;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const NAME_MAX_CHARS: usize = 120;
pub const NOTES_MAX_CHARS: usize = 20_000;
pub const BODY_MAX_CHARS: usize = 100_000;
pub const TAG_MAX_CHARS: usize = 64;
pub const TAGS_MAX_COUNT: usize = 32;

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Field is blank after normalization.
    Required { field: &'static str },
    TooLong {
        field: &'static str,
        max_chars: usize,
        actual_chars: usize,
    },
    NilId { field: &'static str },
    /// Name has leading, trailing or repeated whitespace.
    UnnormalizedName { field: &'static str, value: String },
    /// Tag is blank or not in normalized form.
    InvalidTag { field: &'static str, value: String },
    DuplicateTag { field: &'static str, value: String },
    TooManyTags {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    TimestampOrder {
        created_at: Timestamp,
        updated_at: Timestamp,
    },
    /// Referenced entity does not exist.
    DanglingReference {
        field: &'static str,
        kind: EntityKind,
        id: Uuid,
    },
    /// Entry's character belongs to another campaign.
    CharacterCampaignMismatch {
        character_id: CharacterId,
        character_campaign_id: CampaignId,
        entry_campaign_id: CampaignId,
    },
    /// Same identifier appears twice in one backup document.
    DuplicateId { kind: EntityKind, id: Uuid },
    /// Backup document cannot be decoded.
    MalformedDocument { message: String },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required { field } => write!(f, "{field} is required"),
            Self::TooLong {
                field,
                max_chars,
                actual_chars,
            } => write!(
                f,
                "{field} has {actual_chars} characters, at most {max_chars} allowed"
            ),
            Self::NilId { field } => write!(f, "{field} must not be the nil id"),
            Self::UnnormalizedName { field, value } => {
                write!(f, "{field} `{value}` has untrimmed or repeated whitespace")
            }
            Self::InvalidTag { field, value } => write!(f, "{field} contains invalid tag `{value}`"),
            Self::DuplicateTag { field, value } => {
                write!(f, "{field} contains duplicate tag `{value}`")
            }
            Self::TooManyTags { field, max, actual } => {
                write!(f, "{field} has {actual} tags, at most {max} allowed")
            }
            Self::TimestampOrder {
                created_at,
                updated_at,
            } => write!(
                f,
                "updated_at ({}) must be >= created_at ({})",
                format_timestamp(*updated_at),
                format_timestamp(*created_at)
            ),
            Self::DanglingReference { field, kind, id } => {
                write!(f, "{field} references missing {kind} {id}")
            }
            Self::CharacterCampaignMismatch {
                character_id,
                character_campaign_id,
                entry_campaign_id,
            } => write!(
                f,
                "character {character_id} belongs to campaign {character_campaign_id}, not {entry_campaign_id}"
            ),
            Self::DuplicateId { kind, id } => write!(f, "duplicate {kind} id {id}"),
            Self::MalformedDocument { message } => write!(f, "malformed document: {message}"),
        }
    }
}

/// Aggregated validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns `None` when `violations` is empty.
    pub fn from_violations(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    pub fn single(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn contains(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed: ")?;
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl Error for ValidationError {}

/// Reference resolution used by cross-entity rules.
pub trait ReferenceLookup {
    type Error: From<ValidationError>;

    fn campaign_exists(&self, id: CampaignId) -> Result<bool, Self::Error>;
    /// Owning campaign of `id`, or `None` when the character does not exist.
    fn character_campaign(&self, id: CharacterId) -> Result<Option<CampaignId>, Self::Error>;
}

/// Lookup over a fixed set of known references.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    campaigns: HashSet<CampaignId>,
    characters: HashMap<CharacterId, CampaignId>,
}

impl StaticLookup {
    pub fn with_campaign(mut self, id: CampaignId) -> Self {
        self.campaigns.insert(id);
        self
    }

    pub fn with_character(mut self, id: CharacterId, campaign_id: CampaignId) -> Self {
        self.characters.insert(id, campaign_id);
        self
    }
}

impl ReferenceLookup for StaticLookup {
    type Error = ValidationError;

    fn campaign_exists(&self, id: CampaignId) -> Result<bool, Self::Error> {
        Ok(self.campaigns.contains(&id))
    }

    fn character_campaign(&self, id: CharacterId) -> Result<Option<CampaignId>, Self::Error> {
        Ok(self.characters.get(&id).copied())
    }
}

/// Checks campaign field rules.
pub fn validate_campaign(campaign: &Campaign) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    check_id("id", campaign.id, &mut violations);
    check_name(&campaign.name, &mut violations);
    check_length("notes", &campaign.notes, NOTES_MAX_CHARS, &mut violations);
    check_tags(&campaign.tags, &mut violations);
    check_timestamps(campaign.created_at, campaign.updated_at, &mut violations);
    finish(violations)
}

/// Checks character field rules and that its campaign exists.
pub fn validate_character<L: ReferenceLookup>(
    character: &Character,
    lookup: &L,
) -> Result<(), L::Error> {
    let mut violations = Vec::new();
    check_id("id", character.id, &mut violations);
    check_name(&character.name, &mut violations);
    check_length("notes", &character.notes, NOTES_MAX_CHARS, &mut violations);
    check_timestamps(character.created_at, character.updated_at, &mut violations);
    check_campaign_reference(character.campaign_id, lookup, &mut violations)?;
    finish(violations).map_err(Into::into)
}

/// Checks entry field rules, reference existence and campaign consistency.
pub fn validate_entry<L: ReferenceLookup>(entry: &JournalEntry, lookup: &L) -> Result<(), L::Error> {
    let mut violations = Vec::new();
    check_id("id", entry.id, &mut violations);
    check_length("body", &entry.body, BODY_MAX_CHARS, &mut violations);
    check_tags(&entry.tags, &mut violations);
    check_timestamps(entry.created_at, entry.updated_at, &mut violations);
    check_campaign_reference(entry.campaign_id, lookup, &mut violations)?;

    if let Some(character_id) = entry.character_id {
        match lookup.character_campaign(character_id)? {
            None => violations.push(Violation::DanglingReference {
                field: "character_id",
                kind: EntityKind::Character,
                id: character_id,
            }),
            Some(owner) if owner != entry.campaign_id => {
                violations.push(Violation::CharacterCampaignMismatch {
                    character_id,
                    character_campaign_id: owner,
                    entry_campaign_id: entry.campaign_id,
                })
            }
            Some(_) => {}
        }
    }

    finish(violations).map_err(Into::into)
}

fn finish(violations: Vec<Violation>) -> Result<(), ValidationError> {
    match ValidationError::from_violations(violations) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn check_id(field: &'static str, id: Uuid, violations: &mut Vec<Violation>) {
    if id.is_nil() {
        violations.push(Violation::NilId { field });
    }
}

fn check_name(name: &str, violations: &mut Vec<Violation>) {
    if name.trim().is_empty() {
        violations.push(Violation::Required { field: "name" });
    } else if normalize_name(name) != name {
        violations.push(Violation::UnnormalizedName {
            field: "name",
            value: name.to_string(),
        });
    }
    check_length("name", name, NAME_MAX_CHARS, violations);
}

fn check_length(field: &'static str, value: &str, max_chars: usize, violations: &mut Vec<Violation>) {
    let actual_chars = value.chars().count();
    if actual_chars > max_chars {
        violations.push(Violation::TooLong {
            field,
            max_chars,
            actual_chars,
        });
    }
}

fn check_tags(tags: &[String], violations: &mut Vec<Violation>) {
    if tags.len() > TAGS_MAX_COUNT {
        violations.push(Violation::TooManyTags {
            field: "tags",
            max: TAGS_MAX_COUNT,
            actual: tags.len(),
        });
    }

    let mut seen = HashSet::new();
    for tag in tags {
        if tag.is_empty() || normalize_tag(tag) != *tag {
            violations.push(Violation::InvalidTag {
                field: "tags",
                value: tag.clone(),
            });
            continue;
        }
        if tag.chars().count() > TAG_MAX_CHARS {
            violations.push(Violation::TooLong {
                field: "tags",
                max_chars: TAG_MAX_CHARS,
                actual_chars: tag.chars().count(),
            });
        }
        if !seen.insert(tag.as_str()) {
            violations.push(Violation::DuplicateTag {
                field: "tags",
                value: tag.clone(),
            });
        }
    }
}

fn check_timestamps(created_at: Timestamp, updated_at: Timestamp, violations: &mut Vec<Violation>) {
    if updated_at < created_at {
        violations.push(Violation::TimestampOrder {
            created_at,
            updated_at,
        });
    }
}

fn check_campaign_reference<L: ReferenceLookup>(
    campaign_id: CampaignId,
    lookup: &L,
    violations: &mut Vec<Violation>,
) -> Result<(), L::Error> {
    if campaign_id.is_nil() {
        violations.push(Violation::NilId {
            field: "campaign_id",
        });
    } else if !lookup.campaign_exists(campaign_id)? {
        violations.push(Violation::DanglingReference {
            field: "campaign_id",
            kind: EntityKind::Campaign,
            id: campaign_id,
        });
    }
    Ok(())
}
