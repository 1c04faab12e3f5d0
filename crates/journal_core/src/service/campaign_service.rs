//! Campaign use cases.
//!
//! # Invariants
//! - `delete_campaign` removes the campaign together with every character and
//!   entry it owns, or nothing at all.
//! - Tag filters are normalized the same way stored tags are.

use crate::model::campaign::{Campaign, CampaignId, CampaignPatch, NewCampaign};
use crate::model::text::normalize_tags;
use crate::model::timestamp::now;
use crate::model::validation::validate_campaign;
use crate::model::EntityKind;
use crate::repo::query::CampaignQuery;
use crate::repo::store::Store;
use crate::repo::RepoError;
use crate::service::{log_outcome, retain_in_range, DateRange, ServiceError, ServiceResult};
use std::sync::Arc;
use std::time::Instant;

/// Rows removed by one cascading campaign delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignDeletion {
    pub entries_removed: usize,
    pub characters_removed: usize,
}

pub struct CampaignService<S: Store> {
    store: Arc<S>,
}

impl<S: Store> CampaignService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn create_campaign(&self, draft: NewCampaign) -> ServiceResult<Campaign> {
        let started_at = Instant::now();
        let campaign = Campaign::create(draft, now());
        let id = campaign.id;
        let result = self.store.write(|repos| -> ServiceResult<Campaign> {
            validate_campaign(&campaign)?;
            repos.campaigns().create(&campaign)?;
            Ok(campaign)
        });
        log_outcome("campaign_create", Some(id), started_at, result)
    }

    /// Applies `patch` and advances `updated_at`.
    pub fn edit_campaign(&self, id: CampaignId, patch: CampaignPatch) -> ServiceResult<Campaign> {
        let started_at = Instant::now();
        let result = self.store.write(|repos| -> ServiceResult<Campaign> {
            let mut campaign = repos.campaigns().get(id)?;
            campaign.apply(patch, now());
            validate_campaign(&campaign)?;
            repos.campaigns().update(&campaign)?;
            Ok(campaign)
        });
        log_outcome("campaign_edit", Some(id), started_at, result)
    }

    pub fn get_campaign(&self, id: CampaignId) -> ServiceResult<Campaign> {
        self.store
            .read(|repos| repos.campaigns().get(id).map_err(ServiceError::from))
    }

    /// Deletes the campaign, its entries and its characters in one transaction.
    ///
    /// # Errors
    /// - `NotFound` when the campaign does not exist.
    /// - `DeleteFailed` for any other failure; nothing is removed.
    pub fn delete_campaign(&self, id: CampaignId) -> ServiceResult<CampaignDeletion> {
        let started_at = Instant::now();
        let result = self
            .store
            .write(|repos| -> Result<CampaignDeletion, RepoError> {
                if !repos.campaigns().exists(id)? {
                    return Err(RepoError::not_found(EntityKind::Campaign, id));
                }
                let entries_removed = repos.entries().delete_by_campaign(id)?;
                let characters_removed = repos.characters().delete_by_campaign(id)?;
                repos.campaigns().delete(id)?;
                Ok(CampaignDeletion {
                    entries_removed,
                    characters_removed,
                })
            })
            .map_err(|err| match err {
                RepoError::NotFound { kind, id } => ServiceError::NotFound { kind, id },
                reason => ServiceError::DeleteFailed {
                    kind: EntityKind::Campaign,
                    id,
                    reason,
                },
            });
        log_outcome("campaign_delete", Some(id), started_at, result)
    }

    /// Lists campaigns matching `query`, optionally limited to an `updated_at` window.
    pub fn list_campaigns(
        &self,
        query: &CampaignQuery,
        updated: Option<DateRange>,
    ) -> ServiceResult<Vec<Campaign>> {
        let query = CampaignQuery {
            tags_any: normalize_tags(&query.tags_any),
            ..query.clone()
        };
        let campaigns = self
            .store
            .read(|repos| repos.campaigns().list(&query).map_err(ServiceError::from))?;
        Ok(retain_in_range(campaigns, updated, |campaign| {
            campaign.updated_at
        }))
    }
}
