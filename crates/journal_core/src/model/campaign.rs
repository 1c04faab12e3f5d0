//! Campaign domain model.
//!
//! # Invariants
//! - `id` is stable and never reused for another campaign.
//! - A campaign owns its characters and journal entries.

use crate::model::text::{normalize_name, normalize_tags};
use crate::model::timestamp::{advance, rfc3339_millis, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CampaignId = Uuid;

/// Top-level container for one tabletop campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    /// Normalized, deduplicated, in user order.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: Timestamp,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: Timestamp,
}

/// Input for creating a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCampaign {
    pub name: String,
    pub notes: String,
    pub tags: Vec<String>,
}

impl NewCampaign {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Campaign {
    /// Builds a campaign with a fresh id from normalized draft values.
    pub fn create(draft: NewCampaign, at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: normalize_name(&draft.name),
            notes: draft.notes,
            tags: normalize_tags(&draft.tags),
            created_at: at,
            updated_at: at,
        }
    }

    /// Merges `patch` and advances `updated_at`.
    pub fn apply(&mut self, patch: CampaignPatch, at: Timestamp) {
        if let Some(name) = patch.name {
            self.name = normalize_name(&name);
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(&tags);
        }
        self.updated_at = advance(self.updated_at, at);
    }
}
