//! Journal entry domain model.
//!
//! # Invariants
//! - `body` is always present; it may be empty.
//! - When `character_id` is set, that character belongs to `campaign_id`
//!   (checked by validation, not by this type).

use crate::model::campaign::CampaignId;
use crate::model::character::CharacterId;
use crate::model::text::normalize_tags;
use crate::model::timestamp::{advance, rfc3339_millis, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EntryId = Uuid;

/// One session log or note inside a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: EntryId,
    pub campaign_id: CampaignId,
    /// Optional author/subject character; detached when that character is deleted.
    #[serde(default)]
    pub character_id: Option<CharacterId>,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: Timestamp,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: Timestamp,
}

/// Input for creating a journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub campaign_id: CampaignId,
    pub character_id: Option<CharacterId>,
    pub body: String,
    pub tags: Vec<String>,
}

impl NewEntry {
    pub fn new(campaign_id: CampaignId, body: impl Into<String>) -> Self {
        Self {
            campaign_id,
            character_id: None,
            body: body.into(),
            tags: Vec::new(),
        }
    }

    pub fn by(mut self, character_id: CharacterId) -> Self {
        self.character_id = Some(character_id);
        self
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| (*tag).to_string()).collect();
        self
    }
}

/// Partial edit; `None` keeps the stored value.
///
/// `character_id: Some(None)` detaches the character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub body: Option<String>,
    pub character_id: Option<Option<CharacterId>>,
    pub tags: Option<Vec<String>>,
}

impl JournalEntry {
    pub fn create(draft: NewEntry, at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: draft.campaign_id,
            character_id: draft.character_id,
            body: draft.body,
            tags: normalize_tags(&draft.tags),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn apply(&mut self, patch: EntryPatch, at: Timestamp) {
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(character_id) = patch.character_id {
            self.character_id = character_id;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(&tags);
        }
        self.updated_at = advance(self.updated_at, at);
    }
}
