//! Character repository contract and SQLite implementation.
//!
//! # Invariants
//! - `campaign_uuid` is written once at insert and never updated.
//! - A dangling campaign reference is rejected by the storage foreign key and
//!   surfaces as `Conflict`.

use crate::model::campaign::CampaignId;
use crate::model::character::{Character, CharacterId};
use crate::model::timestamp::to_millis;
use crate::model::EntityKind;
use crate::repo::query::{fold, CharacterQuery};
use crate::repo::sql::{contains_clause, order_clause, parse_millis, parse_uuid, write_error};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CHARACTER_SELECT_SQL: &str = "SELECT
    uuid,
    campaign_uuid,
    name,
    notes,
    created_at,
    updated_at
FROM characters";

/// Repository interface for character persistence.
pub trait CharacterRepository {
    fn create(&self, character: &Character) -> RepoResult<CharacterId>;
    fn get(&self, id: CharacterId) -> RepoResult<Character>;
    fn exists(&self, id: CharacterId) -> RepoResult<bool>;
    /// Writes name, notes and `updated_at`; the campaign reference is fixed.
    fn update(&self, character: &Character) -> RepoResult<()>;
    fn delete(&self, id: CharacterId) -> RepoResult<()>;
    fn list(&self, query: &CharacterQuery) -> RepoResult<Vec<Character>>;
    fn count(&self) -> RepoResult<u64>;
    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize>;
    fn delete_all(&self) -> RepoResult<usize>;
}

/// SQLite-backed character repository.
pub struct SqliteCharacterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCharacterRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CharacterRepository for SqliteCharacterRepository<'_> {
    fn create(&self, character: &Character) -> RepoResult<CharacterId> {
        self.conn
            .execute(
                "INSERT INTO characters (
                    uuid,
                    campaign_uuid,
                    name,
                    notes,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    character.id.to_string(),
                    character.campaign_id.to_string(),
                    character.name.as_str(),
                    character.notes.as_str(),
                    to_millis(character.created_at),
                    to_millis(character.updated_at),
                ],
            )
            .map_err(|err| write_error(EntityKind::Character, err))?;

        Ok(character.id)
    }

    fn get(&self, id: CharacterId) -> RepoResult<Character> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHARACTER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_character_row(row);
        }

        Err(RepoError::not_found(EntityKind::Character, id))
    }

    fn exists(&self, id: CharacterId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM characters WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, character: &Character) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE characters
                 SET
                    name = ?1,
                    notes = ?2,
                    updated_at = ?3
                 WHERE uuid = ?4;",
                params![
                    character.name.as_str(),
                    character.notes.as_str(),
                    to_millis(character.updated_at),
                    character.id.to_string(),
                ],
            )
            .map_err(|err| write_error(EntityKind::Character, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Character, character.id));
        }
        Ok(())
    }

    fn delete(&self, id: CharacterId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM characters WHERE uuid = ?1;", [id.to_string()])
            .map_err(|err| write_error(EntityKind::Character, err))?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Character, id));
        }
        Ok(())
    }

    fn list(&self, query: &CharacterQuery) -> RepoResult<Vec<Character>> {
        let mut sql = format!("{CHARACTER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(campaign_id) = query.campaign_id {
            sql.push_str(" AND campaign_uuid = ?");
            bind_values.push(Value::Text(campaign_id.to_string()));
        }

        if let Some(needle) = query.name_contains.as_deref() {
            sql.push_str(&contains_clause("name"));
            bind_values.push(Value::Text(fold(needle)));
        }

        sql.push_str(&order_clause(query.sort, "name"));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut characters = Vec::new();
        while let Some(row) = rows.next()? {
            characters.push(parse_character_row(row)?);
        }

        Ok(characters)
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM characters;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn delete_by_campaign(&self, campaign_id: CampaignId) -> RepoResult<usize> {
        self.conn
            .execute(
                "DELETE FROM characters WHERE campaign_uuid = ?1;",
                [campaign_id.to_string()],
            )
            .map_err(|err| write_error(EntityKind::Character, err))
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.conn
            .execute("DELETE FROM characters;", [])
            .map_err(|err| write_error(EntityKind::Character, err))
    }
}

fn parse_character_row(row: &Row<'_>) -> RepoResult<Character> {
    let uuid_text: String = row.get("uuid")?;
    let campaign_text: String = row.get("campaign_uuid")?;

    Ok(Character {
        id: parse_uuid(&uuid_text, "characters.uuid")?,
        campaign_id: parse_uuid(&campaign_text, "characters.campaign_uuid")?,
        name: row.get("name")?,
        notes: row.get("notes")?,
        created_at: parse_millis(row.get("created_at")?, "characters.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "characters.updated_at")?,
    })
}
