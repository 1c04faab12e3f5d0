//! Character use cases.
//!
//! # Invariants
//! - A character is only ever stored under an existing campaign.
//! - Deleting a character keeps its entries and clears their reference.

use crate::model::campaign::CampaignId;
use crate::model::character::{Character, CharacterId, CharacterPatch, NewCharacter};
use crate::model::timestamp::now;
use crate::model::validation::validate_character;
use crate::model::EntityKind;
use crate::repo::query::{CharacterQuery, Sort};
use crate::repo::store::Store;
use crate::repo::RepoError;
use crate::service::{
    log_outcome, retain_in_range, DateRange, RepoLookup, ServiceError, ServiceResult,
};
use std::sync::Arc;
use std::time::Instant;

pub struct CharacterService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> CharacterService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a character under `draft.campaign_id`.
    ///
    /// # Errors
    /// - `Validation` with `DanglingReference` when the campaign does not exist.
    pub fn create_character(&self, draft: NewCharacter) -> ServiceResult<Character> {
        let started_at = Instant::now();
        let character = Character::create(draft, now());
        let id = character.id;
        let result = self.store.write(|repos| -> ServiceResult<Character> {
            validate_character(&character, &RepoLookup::new(repos))?;
            repos.characters().create(&character)?;
            Ok(character)
        });
        log_outcome("character_create", Some(id), started_at, result)
    }

    pub fn edit_character(
        &self,
        id: CharacterId,
        patch: CharacterPatch,
    ) -> ServiceResult<Character> {
        let started_at = Instant::now();
        let result = self.store.write(|repos| -> ServiceResult<Character> {
            let mut character = repos.characters().get(id)?;
            character.apply(patch, now());
            validate_character(&character, &RepoLookup::new(repos))?;
            repos.characters().update(&character)?;
            Ok(character)
        });
        log_outcome("character_edit", Some(id), started_at, result)
    }

    pub fn get_character(&self, id: CharacterId) -> ServiceResult<Character> {
        self.store
            .read(|repos| repos.characters().get(id).map_err(ServiceError::from))
    }

    /// Detaches the character from its entries, then deletes it.
    ///
    /// Returns the number of entries that lost their character reference.
    pub fn delete_character(&self, id: CharacterId) -> ServiceResult<usize> {
        let started_at = Instant::now();
        let result = self
            .store
            .write(|repos| -> Result<usize, RepoError> {
                if !repos.characters().exists(id)? {
                    return Err(RepoError::not_found(EntityKind::Character, id));
                }
                let detached = repos.entries().detach_character(id, now())?;
                repos.characters().delete(id)?;
                Ok(detached)
            })
            .map_err(|err| match err {
                RepoError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
                reason => ServiceError::DeleteFailed {
                    kind: EntityKind::Character,
                    id,
                    reason,
                },
            });
        log_outcome("character_delete", Some(id), started_at, result)
    }

    pub fn list_characters(
        &self,
        query: &CharacterQuery,
        updated: Option<DateRange>,
    ) -> ServiceResult<Vec<Character>> {
        let characters = self
            .store
            .read(|repos| repos.characters().list(query).map_err(ServiceError::from))?;
        Ok(retain_in_range(characters, updated, |character| {
            character.updated_at
        }))
    }

    /// Characters of one campaign in name order.
    pub fn characters_of(&self, campaign_id: CampaignId) -> ServiceResult<Vec<Character>> {
        let query = CharacterQuery {
            sort: Sort::by_name(),
            ..CharacterQuery::for_campaign(campaign_id)
        };
        self.list_characters(&query, None)
    }
}
