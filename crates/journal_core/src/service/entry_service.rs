//! Journal entry use cases and entry search.
//!
//! # Invariants
//! - An entry's character, when set, belongs to the entry's campaign.
//! - An entry stays in the campaign it was created in.
//! - Search results are ordered by `updated_at DESC, uuid ASC`.

use crate::model::campaign::CampaignId;
use crate::model::entry::{EntryId, EntryPatch, JournalEntry, NewEntry};
use crate::model::text::normalize_tags;
use crate::model::timestamp::now;
use crate::model::validation::validate_entry;
use crate::repo::query::{EntryQuery, Sort};
use crate::repo::store::Store;
use crate::service::{
    log_outcome, retain_in_range, DateRange, RepoLookup, ServiceError, ServiceResult,
};
use std::sync::Arc;
use std::time::Instant;

/// Substring search over entry bodies and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub campaign_id: Option<CampaignId>,
    /// Maximum number of hits; `None` returns all.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn in_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub struct EntryService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> EntryService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates an entry in `draft.campaign_id`.
    ///
    /// # Errors
    /// - `Validation` when the campaign is missing, or the character is
    ///   missing or belongs to another campaign.
    pub fn create_entry(&self, draft: NewEntry) -> ServiceResult<JournalEntry> {
        let started_at = Instant::now();
        let entry = JournalEntry::create(draft, now());
        let id = entry.id;
        let result = self.store.write(|repos| -> ServiceResult<JournalEntry> {
            validate_entry(&entry, &RepoLookup::new(repos))?;
            repos.entries().create(&entry)?;
            Ok(entry)
        });
        log_outcome("entry_create", Some(id), started_at, result)
    }

    pub fn edit_entry(&self, id: EntryId, patch: EntryPatch) -> ServiceResult<JournalEntry> {
        let started_at = Instant::now();
        let result = self.store.write(|repos| -> ServiceResult<JournalEntry> {
            let mut entry = repos.entries().get(id)?;
            entry.apply(patch, now());
            validate_entry(&entry, &RepoLookup::new(repos))?;
            repos.entries().update(&entry)?;
            Ok(entry)
        });
        log_outcome("entry_edit", Some(id), started_at, result)
    }

    pub fn get_entry(&self, id: EntryId) -> ServiceResult<JournalEntry> {
        self.store
            .read(|repos| repos.entries().get(id).map_err(ServiceError::from))
    }

    pub fn delete_entry(&self, id: EntryId) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self
            .store
            .write(|repos| repos.entries().delete(id).map_err(ServiceError::from));
        log_outcome("entry_delete", Some(id), started_at, result)
    }

    pub fn list_entries(
        &self,
        query: &EntryQuery,
        updated: Option<DateRange>,
    ) -> ServiceResult<Vec<JournalEntry>> {
        let query = EntryQuery {
            tags_any: normalize_tags(&query.tags_any),
            ..query.clone()
        };
        let entries = self
            .store
            .read(|repos| repos.entries().list(&query).map_err(ServiceError::from))?;
        Ok(retain_in_range(entries, updated, |entry| entry.updated_at))
    }

    /// Case-insensitive substring search over body text and tags.
    ///
    /// Blank search text matches nothing.
    pub fn search_entries(&self, query: &SearchQuery) -> ServiceResult<Vec<JournalEntry>> {
        let started_at = Instant::now();
        let needle = query.text.trim().to_lowercase();
        if needle.is_empty() || query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let scope = EntryQuery {
            campaign_id: query.campaign_id,
            sort: Sort::recent_first(),
            ..EntryQuery::default()
        };
        let result = self
            .store
            .read(|repos| repos.entries().list(&scope).map_err(ServiceError::from))
            .map(|entries| {
                let hits = entries
                    .into_iter()
                    .filter(|entry| entry_matches(entry, &needle));
                match query.limit {
                    Some(limit) => hits.take(limit).collect(),
                    None => hits.collect(),
                }
            });
        log_outcome("entry_search", query.campaign_id, started_at, result)
    }
}

fn entry_matches(entry: &JournalEntry, needle: &str) -> bool {
    entry.body.to_lowercase().contains(needle)
        || entry.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::entry_matches;
    use crate::model::entry::{JournalEntry, NewEntry};
    use crate::model::timestamp::from_millis;
    use uuid::Uuid;

    #[test]
    fn search_matches_body_and_tags_case_insensitively() {
        let at = from_millis(1_700_000_000_000).unwrap();
        let entry = JournalEntry::create(
            NewEntry::new(Uuid::new_v4(), "The party met ÉLODIE at the gate").tagged(&["ambush"]),
            at,
        );
        assert!(entry_matches(&entry, "élodie"));
        assert!(entry_matches(&entry, "amb"));
        assert!(!entry_matches(&entry, "dragon"));
    }
}
