//! Campaign repository contract and SQLite implementation.
//!
//! # Invariants
//! - Tags are stored in `campaign_tags` and read back in list order.
//! - Deleting a campaign that still owns characters or entries is a
//!   `Conflict`; cascading is the caller's job.

use crate::model::campaign::{Campaign, CampaignId};
use crate::model::timestamp::to_millis;
use crate::model::EntityKind;
use crate::repo::query::{fold, CampaignQuery};
use crate::repo::sql::{
    contains_clause, order_clause, parse_millis, parse_uuid, write_error, CAMPAIGN_TAGS,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CAMPAIGN_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    notes,
    created_at,
    updated_at
FROM campaigns";

/// Repository interface for campaign persistence.
pub trait CampaignRepository {
    fn create(&self, campaign: &Campaign) -> RepoResult<CampaignId>;
    fn get(&self, id: CampaignId) -> RepoResult<Campaign>;
    fn exists(&self, id: CampaignId) -> RepoResult<bool>;
    fn update(&self, campaign: &Campaign) -> RepoResult<()>;
    fn delete(&self, id: CampaignId) -> RepoResult<()>;
    /// Re-runs the query on every call.
    fn list(&self, query: &CampaignQuery) -> RepoResult<Vec<Campaign>>;
    fn count(&self) -> RepoResult<u64>;
    /// Removes every campaign; fails with `Conflict` while dependents remain.
    fn delete_all(&self) -> RepoResult<usize>;
}

/// SQLite-backed campaign repository.
pub struct SqliteCampaignRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCampaignRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CampaignRepository for SqliteCampaignRepository<'_> {
    fn create(&self, campaign: &Campaign) -> RepoResult<CampaignId> {
        let uuid = campaign.id.to_string();
        self.conn
            .execute(
                "INSERT INTO campaigns (
                    uuid,
                    name,
                    notes,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    uuid.as_str(),
                    campaign.name.as_str(),
                    campaign.notes.as_str(),
                    to_millis(campaign.created_at),
                    to_millis(campaign.updated_at),
                ],
            )
            .map_err(|err| write_error(EntityKind::Campaign, err))?;
        CAMPAIGN_TAGS
            .replace(self.conn, &uuid, &campaign.tags)
            .map_err(|err| write_error(EntityKind::Campaign, err))?;

        Ok(campaign.id)
    }

    fn get(&self, id: CampaignId) -> RepoResult<Campaign> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CAMPAIGN_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_campaign_row(self.conn, row);
        }

        Err(RepoError::not_found(EntityKind::Campaign, id))
    }

    fn exists(&self, id: CampaignId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM campaigns WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, campaign: &Campaign) -> RepoResult<()> {
        let uuid = campaign.id.to_string();
        let changed = self
            .conn
            .execute(
                "UPDATE campaigns
                 SET
                    name = ?1,
                    notes = ?2,
                    updated_at = ?3
                 WHERE uuid = ?4;",
                params![
                    campaign.name.as_str(),
                    campaign.notes.as_str(),
                    to_millis(campaign.updated_at),
                    uuid.as_str(),
                ],
            )
            .map_err(|err| write_error(EntityKind::Campaign, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Campaign, campaign.id));
        }

        CAMPAIGN_TAGS
            .replace(self.conn, &uuid, &campaign.tags)
            .map_err(|err| write_error(EntityKind::Campaign, err))?;
        Ok(())
    }

    fn delete(&self, id: CampaignId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM campaigns WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| write_error(EntityKind::Campaign, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Campaign, id));
        }
        Ok(())
    }

    fn list(&self, query: &CampaignQuery) -> RepoResult<Vec<Campaign>> {
        let mut sql = format!("{CAMPAIGN_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(needle) = query.name_contains.as_deref() {
            sql.push_str(&contains_clause("name"));
            bind_values.push(Value::Text(fold(needle)));
        }

        if !query.tags_any.is_empty() {
            sql.push_str(&CAMPAIGN_TAGS.any_clause(query.tags_any.len()));
            bind_values.extend(query.tags_any.iter().cloned().map(Value::Text));
        }

        sql.push_str(&order_clause(query.sort, "name"));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut campaigns = Vec::new();
        while let Some(row) = rows.next()? {
            campaigns.push(parse_campaign_row(self.conn, row)?);
        }

        Ok(campaigns)
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM campaigns;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.conn
            .execute("DELETE FROM campaigns;", [])
            .map_err(|err| write_error(EntityKind::Campaign, err))
    }
}

fn parse_campaign_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Campaign> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "campaigns.uuid")?;
    let tags = CAMPAIGN_TAGS.load(conn, &uuid_text)?;

    Ok(Campaign {
        id,
        name: row.get("name")?,
        notes: row.get("notes")?,
        tags,
        created_at: parse_millis(row.get("created_at")?, "campaigns.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "campaigns.updated_at")?,
    })
}
