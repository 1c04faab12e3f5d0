//! Filter and sort options shared by repository implementations.
//!
//! # Invariants
//! - Substring filters are case-insensitive for ASCII letters, matching
//!   SQLite `lower()` and `NOCASE`.
//! - Tag filters match when the entity shares at least one tag.
//! - Ties in every sort order are broken by identifier ascending, except
//!   creation order, which falls back to insertion order.

use crate::model::campaign::{Campaign, CampaignId};
use crate::model::character::{Character, CharacterId};
use crate::model::entry::JournalEntry;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    /// Name for campaigns/characters, body text for entries.
    Name,
    #[default]
    UpdatedAt,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Ordering of list results. Defaults to most recently modified first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn by_name() -> Self {
        Self::new(SortField::Name, SortDirection::Asc)
    }

    pub fn recent_first() -> Self {
        Self::new(SortField::UpdatedAt, SortDirection::Desc)
    }

    pub fn creation_order() -> Self {
        Self::new(SortField::CreatedAt, SortDirection::Asc)
    }

    pub(crate) fn apply(&self, primary: Ordering) -> Ordering {
        match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignQuery {
    pub name_contains: Option<String>,
    pub tags_any: Vec<String>,
    pub sort: Sort,
}

impl CampaignQuery {
    pub fn matches(&self, campaign: &Campaign) -> bool {
        contains_folded(&campaign.name, self.name_contains.as_deref())
            && shares_tag(&campaign.tags, &self.tags_any)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterQuery {
    pub campaign_id: Option<CampaignId>,
    pub name_contains: Option<String>,
    pub sort: Sort,
}

impl CharacterQuery {
    pub fn for_campaign(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, character: &Character) -> bool {
        self.campaign_id
            .map_or(true, |campaign_id| character.campaign_id == campaign_id)
            && contains_folded(&character.name, self.name_contains.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub campaign_id: Option<CampaignId>,
    pub character_id: Option<CharacterId>,
    pub body_contains: Option<String>,
    pub tags_any: Vec<String>,
    pub sort: Sort,
}

impl EntryQuery {
    pub fn for_campaign(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.campaign_id
            .map_or(true, |campaign_id| entry.campaign_id == campaign_id)
            && self
                .character_id
                .map_or(true, |character_id| entry.character_id == Some(character_id))
            && contains_folded(&entry.body, self.body_contains.as_deref())
            && shares_tag(&entry.tags, &self.tags_any)
    }
}

/// Lowercases ASCII letters only, like SQLite without ICU.
pub(crate) fn fold(value: &str) -> String {
    value.to_ascii_lowercase()
}

fn contains_folded(haystack: &str, needle: Option<&str>) -> bool {
    needle.map_or(true, |needle| fold(haystack).contains(&fold(needle)))
}

fn shares_tag(tags: &[String], wanted: &[String]) -> bool {
    wanted.is_empty() || wanted.iter().any(|tag| tags.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::{Sort, SortDirection, SortField};
    use std::cmp::Ordering;

    #[test]
    fn default_sort_is_recent_first() {
        assert_eq!(Sort::default(), Sort::recent_first());
        assert_eq!(Sort::default().field, SortField::UpdatedAt);
        assert_eq!(Sort::default().direction, SortDirection::Desc);
    }

    #[test]
    fn descending_reverses_primary_ordering() {
        assert_eq!(Sort::recent_first().apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Sort::by_name().apply(Ordering::Less), Ordering::Less);
    }
}
