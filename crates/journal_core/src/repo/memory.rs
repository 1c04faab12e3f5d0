//! In-memory [`Store`] used by tests and ephemeral sessions.
//!
//! Mirrors the SQLite backend: same constraint failures, same list
//! ordering, same all-or-nothing writes.

use crate::model::campaign::{Campaign, CampaignId};
use crate::model::character::{Character, CharacterId};
use crate::model::entry::{EntryId, JournalEntry};
use crate::model::timestamp::{advance, Timestamp};
use crate::model::EntityKind;
use crate::repo::campaign_repo::CampaignRepository;
use crate::repo::character_repo::CharacterRepository;
use crate::repo::entry_repo::EntryRepository;
use crate::repo::query::{fold, CampaignQuery, CharacterQuery, EntryQuery, Sort, SortField};
use crate::repo::store::{RepositorySet, Store};
use crate::repo::{RepoError, RepoResult};
use log::warn;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Stored<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_seq: u64,
    campaigns: BTreeMap<CampaignId, Stored<Campaign>>,
    characters: BTreeMap<CharacterId, Stored<Character>>,
    entries: BTreeMap<EntryId, Stored<JournalEntry>>,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// Process-local store with transactional copy-on-write semantics.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("event=memory_store_lock module=repo status=recovered reason=poisoned");
            poisoned.into_inner()
        })
    }
}

impl Store for MemoryStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>,
    {
        let snapshot = self.lock().clone();
        f(&MemoryRepositories::new(snapshot))
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RepositorySet) -> Result<T, E>,
        E: From<RepoError>,
    {
        let mut guard = self.lock();
        let scope = MemoryRepositories::new(guard.clone());
        let value = f(&scope)?;
        *guard = scope.state.into_inner();
        Ok(value)
    }
}

struct MemoryRepositories {
    state: RefCell<MemoryState>,
}

impl MemoryRepositories {
    fn new(state: MemoryState) -> Self {
        Self {
            state: RefCell::new(state),
        }
    }
}

impl RepositorySet for MemoryRepositories {
    fn campaigns(&self) -> &dyn CampaignRepository {
        self
    }

    fn characters(&self) -> &dyn CharacterRepository {
        self
    }

    fn entries(&self) -> &dyn EntryRepository {
        self
    }
}

fn conflict(kind: EntityKind, message: impl Into<String>) -> RepoError {
    RepoError::Conflict {
        kind,
        message: message.into(),
    }
}

/// Orders stored rows the way the SQL `ORDER BY` built for `sort` does.
fn sort_rows<T>(
    rows: &mut [&Stored<T>],
    sort: Sort,
    id: impl Fn(&T) -> Uuid,
    name: impl Fn(&T) -> String,
    created_at: impl Fn(&T) -> Timestamp,
    updated_at: impl Fn(&T) -> Timestamp,
) {
    rows.sort_by(|left, right| {
        let (a, b) = (&left.value, &right.value);
        match sort.field {
            SortField::Name => sort
                .apply(name(a).cmp(&name(b)))
                .then_with(|| id(a).cmp(&id(b))),
            SortField::UpdatedAt => sort
                .apply(updated_at(a).cmp(&updated_at(b)))
                .then_with(|| id(a).cmp(&id(b))),
            SortField::CreatedAt => sort.apply(
                created_at(a)
                    .cmp(&created_at(b))
                    .then_with(|| left.seq.cmp(&right.seq)),
            ),
        }
    });
}

impl CampaignRepository for MemoryRepositories {
    fn create(&self, campaign: &Campaign) -> RepoResult<CampaignId> {
        let mut state = self.state.borrow_mut();
        if state.campaigns.contains_key(&campaign.id) {
            return Err(conflict(EntityKind::Campaign, "UNIQUE constraint failed: campaigns.uuid"));
        }
        let seq = state.next_seq();
        state.campaigns.insert(
            campaign.id,
            Stored {
                seq,
                value: campaign.clone(),
            },
        );
        Ok(campaign.id)
    }

    fn get(&self, id: CampaignId) -> RepoResult<Campaign> {
        self.state
            .borrow()
            .campaigns
            .get(&id)
            .map(|stored| stored.value.clone())
            .ok_or_else(|| RepoError::not_found(EntityKind::Campaign, id))
    }

    fn exists(&self, id: CampaignId) -> RepoResult<bool> {
        Ok(self.state.borrow().campaigns.contains_key(&id))
    }

    fn update(&self, campaign: &Campaign) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .campaigns
            .get_mut(&campaign.id)
            .ok_or_else(|| RepoError::not_found(EntityKind::Campaign, campaign.id))?;
        stored.value.name = campaign.name.clone();
        stored.value.notes = campaign.notes.clone();
        stored.value.tags = campaign.tags.clone();
        stored.value.updated_at = campaign.updated_at;
        Ok(())
    }

    fn delete(&self, id: CampaignId) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.campaigns.contains_key(&id) {
            return Err(RepoError::not_found(EntityKind::Campaign, id));
        }
        let referenced = state.characters.values().any(|c| c.value.campaign_id == id)
            || state.entries.values().any(|e| e.value.campaign_id == id);
        if referenced {
            return Err(conflict(EntityKind::Campaign, "FOREIGN KEY constraint failed"));
        }
        state.campaigns.remove(&id);
        Ok(())
    }

    fn list(&self, query: &CampaignQuery) -> RepoResult<Vec<Campaign>> {
        let state = self.state.borrow();
        let mut rows: Vec<_> = state
            .campaigns
            .values()
            .filter(|stored| query.matches(&stored.value))
            .collect();
        sort_rows(
            &mut rows,
            query.sort,
            |c: &Campaign| c.id,
            |c| fold(&c.name),
            |c| c.created_at,
            |c| c.updated_at,
        );
        Ok(rows.into_iter().map(|stored| stored.value.clone()).collect())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.state.borrow().campaigns.len() as u64)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        if !state.characters.is_empty() || !state.entries.is_empty() {
            return Err(conflict(EntityKind::Campaign, "FOREIGN KEY constraint failed"));
        }
        let removed = state.campaigns.len();
        state.campaigns.clear();
        Ok(removed)
    }
}

impl CharacterRepository for MemoryRepositories {
    fn create(&self, character: &Character) -> RepoResult<CharacterId> {
        let mut state = self.state.borrow_mut();
        if state.characters.contains_key(&character.id) {
            return Err(conflict(
                EntityKind::Character,
                "UNIQUE constraint failed: characters.uuid",
            ));
        }
        if !state.campaigns.contains_key(&character.campaign_id) {
            return Err(conflict(EntityKind::Character, "FOREIGN KEY constraint failed"));
        }
        let seq = state.next_seq();
        state.characters.insert(
            character.id,
            Stored {
                seq,
                value: character.clone(),
            },
        );
        Ok(character.id)
    }

    fn get(&self, id: CharacterId) -> RepoResult<Character> {
        self.state
            .borrow()
            .characters
            .get(&id)
            .map(|stored| stored.value.clone())
            .ok_or_else(|| RepoError::not_found(EntityKind::Character, id))
    }

    fn exists(&self, id: CharacterId) -> RepoResult<bool> {
        Ok(self.state.borrow().characters.contains_key(&id))
    }

    fn update(&self, character: &Character) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        let stored = state
            .characters
            .get_mut(&character.id)
            .ok_or_else(|| RepoError::not_found(EntityKind::Character, character.id))?;
        stored.value.name = character.name.clone();
        stored.value.notes = character.notes.clone();
        stored.value.updated_at = character.updated_at;
        Ok(())
    }

    fn delete(&self, id: CharacterId) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.characters.contains_key(&id) {
            return Err(RepoError::not_found(EntityKind::Character, id));
        }
        if state
            .entries
            .values()
            .any(|e| e.value.character_id == Some(id))
        {
            return Err(conflict(EntityKind::Character, "FOREIGN KEY constraint failed"));
        }
        state.characters.remove(&id);
        Ok(())
    }

    fn list(&self, query: &CharacterQuery) -> RepoResult<Vec<Character>> {
        let state = self.state.borrow();
        let mut rows: Vec<_> = state
            .characters
            .values()
            .filter(|stored| query.matches(&stored.value))
            .collect();
        sort_rows(
            &mut rows,
            query.sort,
            |c: &Character| c.id,
            |c| fold(&c.name),
            |c| c.created_at,
            |c| c.updated_at,
        );
        Ok(rows.into_iter().map(|stored| stored.value.clone()).collect())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.state.borrow().characters.len() as u64)
    }

    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        let doomed: Vec<CharacterId> = state
            .characters
            .values()
            .filter(|c| c.value.campaign_id == campaign_id)
            .map(|c| c.value.id)
            .collect();
        if state
            .entries
            .values()
            .any(|e| e.value.character_id.map_or(false, |id| doomed.contains(&id)))
        {
            return Err(conflict(EntityKind::Character, "FOREIGN KEY constraint failed"));
        }
        for id in &doomed {
            state.characters.remove(id);
        }
        Ok(doomed.len())
    }

    fn delete_all(&self) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        if state.entries.values().any(|e| e.value.character_id.is_some()) {
            return Err(conflict(EntityKind::Character, "FOREIGN KEY constraint failed"));
        }
        let removed = state.characters.len();
        state.characters.clear();
        Ok(removed)
    }
}

impl MemoryRepositories {
    fn check_entry_references(&self, entry: &JournalEntry) -> RepoResult<()> {
        let state = self.state.borrow();
        let campaign_ok = state.campaigns.contains_key(&entry.campaign_id);
        let character_ok = entry
            .character_id
            .map_or(true, |id| state.characters.contains_key(&id));
        if campaign_ok && character_ok {
            Ok(())
        } else {
            Err(conflict(EntityKind::Entry, "FOREIGN KEY constraint failed"))
        }
    }
}

impl EntryRepository for MemoryRepositories {
    fn create(&self, entry: &JournalEntry) -> RepoResult<EntryId> {
        if self.state.borrow().entries.contains_key(&entry.id) {
            return Err(conflict(EntityKind::Entry, "UNIQUE constraint failed: entries.uuid"));
        }
        self.check_entry_references(entry)?;
        let mut state = self.state.borrow_mut();
        let seq = state.next_seq();
        state.entries.insert(
            entry.id,
            Stored {
                seq,
                value: entry.clone(),
            },
        );
        Ok(entry.id)
    }

    fn get(&self, id: EntryId) -> RepoResult<JournalEntry> {
        self.state
            .borrow()
            .entries
            .get(&id)
            .map(|stored| stored.value.clone())
            .ok_or_else(|| RepoError::not_found(EntityKind::Entry, id))
    }

    fn exists(&self, id: EntryId) -> RepoResult<bool> {
        Ok(self.state.borrow().entries.contains_key(&id))
    }

    fn update(&self, entry: &JournalEntry) -> RepoResult<()> {
        if !self.state.borrow().entries.contains_key(&entry.id) {
            return Err(RepoError::not_found(EntityKind::Entry, entry.id));
        }
        self.check_entry_references(entry)?;
        let mut state = self.state.borrow_mut();
        if let Some(stored) = state.entries.get_mut(&entry.id) {
            stored.value.character_id = entry.character_id;
            stored.value.body = entry.body.clone();
            stored.value.tags = entry.tags.clone();
            stored.value.updated_at = entry.updated_at;
        }
        Ok(())
    }

    fn delete(&self, id: EntryId) -> RepoResult<()> {
        self.state
            .borrow_mut()
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found(EntityKind::Entry, id))
    }

    fn list(&self, query: &EntryQuery) -> RepoResult<Vec<JournalEntry>> {
        let state = self.state.borrow();
        let mut rows: Vec<_> = state
            .entries
            .values()
            .filter(|stored| query.matches(&stored.value))
            .collect();
        sort_rows(
            &mut rows,
            query.sort,
            |e: &JournalEntry| e.id,
            |e| fold(&e.body),
            |e| e.created_at,
            |e| e.updated_at,
        );
        Ok(rows.into_iter().map(|stored| stored.value.clone()).collect())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.state.borrow().entries.len() as u64)
    }

    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, stored| stored.value.campaign_id != campaign_id);
        Ok(before - state.entries.len())
    }

    fn detach_character(&self, character_id: CharacterId, at: Timestamp) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        let mut touched = 0;
        for stored in state.entries.values_mut() {
            if stored.value.character_id == Some(character_id) {
                stored.value.character_id = None;
                stored.value.updated_at = advance(stored.value.updated_at, at);
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        let mut state = self.state.borrow_mut();
        let removed = state.entries.len();
        state.entries.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::model::campaign::{Campaign, NewCampaign};
    use crate::model::timestamp::from_millis;
    use crate::repo::query::CampaignQuery;
    use crate::repo::store::Store;
    use crate::repo::RepoError;

    #[test]
    fn failed_write_discards_every_change() {
        let store = MemoryStore::new();
        let at = from_millis(1_700_000_000_000).unwrap();
        let campaign = Campaign::create(NewCampaign::named("Kept"), at);

        store
            .write(|repos| repos.campaigns().create(&campaign).map(|_| ()))
            .unwrap();

        let result = store.write(|repos| -> Result<(), RepoError> {
            repos
                .campaigns()
                .create(&Campaign::create(NewCampaign::named("Dropped"), at))?;
            repos.campaigns().create(&campaign)?;
            Ok(())
        });
        assert!(matches!(result, Err(RepoError::Conflict { .. })));

        let names: Vec<String> = store
            .read(|repos| repos.campaigns().list(&CampaignQuery::default()))
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Kept".to_string()]);
    }
}
