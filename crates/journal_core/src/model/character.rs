//! Character domain model.
//!
//! # Invariants
//! - `campaign_id` is fixed at creation; reassignment is not supported.

use crate::model::campaign::CampaignId;
use crate::model::text::normalize_name;
use crate::model::timestamp::{advance, rfc3339_millis, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CharacterId = Uuid;

/// Player or non-player character belonging to one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub campaign_id: CampaignId,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(with = "rfc3339_millis")]
    pub created_at: Timestamp,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: Timestamp,
}

/// Input for creating a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCharacter {
    pub campaign_id: CampaignId,
    pub name: String,
    pub notes: String,
}

impl NewCharacter {
    pub fn new(campaign_id: CampaignId, name: impl Into<String>) -> Self {
        Self {
            campaign_id,
            name: name.into(),
            notes: String::new(),
        }
    }
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub notes: Option<String>,
}

impl Character {
    pub fn create(draft: NewCharacter, at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: draft.campaign_id,
            name: normalize_name(&draft.name),
            notes: draft.notes,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn apply(&mut self, patch: CharacterPatch, at: Timestamp) {
        if let Some(name) = patch.name {
            self.name = normalize_name(&name);
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = advance(self.updated_at, at);
    }
}
