//! Journal entry repository contract and SQLite implementation.
//!
//! # Invariants
//! - Entry tags are stored in `entry_tags` and read back in list order.
//! - `detach_character` advances `updated_at` of every touched entry.

use crate::model::campaign::CampaignId;
use crate::model::character::CharacterId;
use crate::model::entry::{EntryId, JournalEntry};
use crate::model::timestamp::{to_millis, Timestamp};
use crate::model::EntityKind;
use crate::repo::query::{fold, EntryQuery};
use crate::repo::sql::{
    contains_clause, order_clause, parse_millis, parse_uuid, write_error, ENTRY_TAGS,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ENTRY_SELECT_SQL: &str = "SELECT
    uuid,
    campaign_uuid,
    character_uuid,
    body,
    created_at,
    updated_at
FROM entries";

/// Repository interface for journal entry persistence.
pub trait EntryRepository {
    fn create(&self, entry: &JournalEntry) -> RepoResult<EntryId>;
    fn get(&self, id: EntryId) -> RepoResult<JournalEntry>;
    fn exists(&self, id: EntryId) -> RepoResult<bool>;
    /// Writes character reference, body, tags and `updated_at`.
    fn update(&self, entry: &JournalEntry) -> RepoResult<()>;
    fn delete(&self, id: EntryId) -> RepoResult<()>;
    fn list(&self, query: &EntryQuery) -> RepoResult<Vec<JournalEntry>>;
    fn count(&self) -> RepoResult<u64>;
    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize>;
    /// Clears the character reference on every entry pointing at `character_id`.
    ///
    /// Each touched entry gets `updated_at = max(updated_at + 1ms, at)`.
    fn detach_character(&self, character_id: CharacterId, at: Timestamp) -> RepoResult<usize>;
    fn delete_all(&self) -> RepoResult<usize>;
}

/// SQLite-backed journal entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create(&self, entry: &JournalEntry) -> RepoResult<EntryId> {
        let uuid = entry.id.to_string();
        self.conn
            .execute(
                "INSERT INTO entries (
                    uuid,
                    campaign_uuid,
                    character_uuid,
                    body,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    uuid.as_str(),
                    entry.campaign_id.to_string(),
                    entry.character_id.map(|id| id.to_string()),
                    entry.body.as_str(),
                    to_millis(entry.created_at),
                    to_millis(entry.updated_at),
                ],
            )
            .map_err(|err| write_error(EntityKind::Entry, err))?;
        ENTRY_TAGS
            .replace(self.conn, &uuid, &entry.tags)
            .map_err(|err| write_error(EntityKind::Entry, err))?;

        Ok(entry.id)
    }

    fn get(&self, id: EntryId) -> RepoResult<JournalEntry> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_entry_row(self.conn, row);
        }

        Err(RepoError::not_found(EntityKind::Entry, id))
    }

    fn exists(&self, id: EntryId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entries WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, entry: &JournalEntry) -> RepoResult<()> {
        let uuid = entry.id.to_string();
        let changed = self
            .conn
            .execute(
                "UPDATE entries
                 SET
                    character_uuid = ?1,
                    body = ?2,
                    updated_at = ?3
                 WHERE uuid = ?4;",
                params![
                    entry.character_id.map(|id| id.to_string()),
                    entry.body.as_str(),
                    to_millis(entry.updated_at),
                    uuid.as_str(),
                ],
            )
            .map_err(|err| write_error(EntityKind::Entry, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Entry, entry.id));
        }

        ENTRY_TAGS
            .replace(self.conn, &uuid, &entry.tags)
            .map_err(|err| write_error(EntityKind::Entry, err))?;
        Ok(())
    }

    fn delete(&self, id: EntryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM entries WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| write_error(EntityKind::Entry, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Entry, id));
        }
        Ok(())
    }

    fn list(&self, query: &EntryQuery) -> RepoResult<Vec<JournalEntry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(campaign_id) = query.campaign_id {
            sql.push_str(" AND campaign_uuid = ?");
            bind_values.push(Value::Text(campaign_id.to_string()));
        }

        if let Some(character_id) = query.character_id {
            sql.push_str(" AND character_uuid = ?");
            bind_values.push(Value::Text(character_id.to_string()));
        }

        if let Some(needle) = query.body_contains.as_deref() {
            sql.push_str(&contains_clause("body"));
            bind_values.push(Value::Text(fold(needle)));
        }

        if !query.tags_any.is_empty() {
            sql.push_str(&ENTRY_TAGS.any_clause(query.tags_any.len()));
            bind_values.extend(query.tags_any.iter().cloned().map(Value::Text));
        }

        sql.push_str(&order_clause(query.sort, "body"));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(self.conn, row)?);
        }

        Ok(entries)
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize> {
        self.conn
            .execute(
                "DELETE FROM entries WHERE campaign_uuid = ?1;",
                [campaign_id.to_string()],
            )
            .map_err(|err| write_error(EntityKind::Entry, err))
    }

    fn detach_character(&self, character_id: CharacterId, at: Timestamp) -> RepoResult<usize> {
        self.conn
            .execute(
                "UPDATE entries
                 SET
                    character_uuid = NULL,
                    updated_at = MAX(updated_at + 1, ?2)
                 WHERE character_uuid = ?1;",
                params![character_id.to_string(), to_millis(at)],
            )
            .map_err(|err| write_error(EntityKind::Entry, err))
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.conn
            .execute("DELETE FROM entries;", [])
            .map_err(|err| write_error(EntityKind::Entry, err))
    }
}

fn parse_entry_row(conn: &Connection, row: &Row<'_>) -> RepoResult<JournalEntry> {
    let uuid_text: String = row.get("uuid")?;
    let campaign_text: String = row.get("campaign_uuid")?;
    let character_id = match row.get::<_, Option<String>>("character_uuid")? {
        Some(value) => Some(parse_uuid(&value, "entries.character_uuid")?),
        None => None,
    };
    let tags = ENTRY_TAGS.load(conn, &uuid_text)?;

    Ok(JournalEntry {
        id: parse_uuid(&uuid_text, "entries.uuid")?,
        campaign_id: parse_uuid(&campaign_text, "entries.campaign_uuid")?,
        character_id,
        body: row.get("body")?,
        tags,
        created_at: parse_millis(row.get("created_at")?, "entries.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "entries.updated_at")?,
    })
}
