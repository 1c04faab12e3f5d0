//! SQL helpers shared by the SQLite repositories.

use crate::model::timestamp::{from_millis, Timestamp};
use crate::model::EntityKind;
use crate::repo::query::{Sort, SortDirection, SortField};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, ErrorCode};
use uuid::Uuid;

/// Ordered tag link table owned by one entity table.
pub(crate) struct TagTable {
    table: &'static str,
    owner_column: &'static str,
    owner_table: &'static str,
}

pub(crate) const CAMPAIGN_TAGS: TagTable = TagTable {
    table: "campaign_tags",
    owner_column: "campaign_uuid",
    owner_table: "campaigns",
};

pub(crate) const ENTRY_TAGS: TagTable = TagTable {
    table: "entry_tags",
    owner_column: "entry_uuid",
    owner_table: "entries",
};

impl TagTable {
    /// Replaces the full tag list of `owner`, keeping list order.
    pub(crate) fn replace(&self, conn: &Connection, owner: &str, tags: &[String]) -> rusqlite::Result<()> {
        conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?1;", self.table, self.owner_column),
            [owner],
        )?;
        let insert_sql = format!(
            "INSERT INTO {} ({}, tag, position) VALUES (?1, ?2, ?3);",
            self.table, self.owner_column
        );
        for (position, tag) in tags.iter().enumerate() {
            conn.execute(&insert_sql, params![owner, tag.as_str(), position as i64])?;
        }
        Ok(())
    }

    pub(crate) fn load(&self, conn: &Connection, owner: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT tag FROM {} WHERE {} = ?1 ORDER BY position ASC;",
            self.table, self.owner_column
        ))?;
        let tags = stmt
            .query_map([owner], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    /// `AND EXISTS (...)` clause matching owners sharing any of `count` bound tags.
    pub(crate) fn any_clause(&self, count: usize) -> String {
        let placeholders = vec!["?"; count].join(", ");
        format!(
            " AND EXISTS (
                SELECT 1 FROM {table} linked
                WHERE linked.{owner_column} = {owner_table}.uuid
                  AND linked.tag IN ({placeholders})
            )",
            table = self.table,
            owner_column = self.owner_column,
            owner_table = self.owner_table,
        )
    }
}

/// `ORDER BY` clause; ties fall back to `uuid ASC` (insertion order for creation sorts).
pub(crate) fn order_clause(sort: Sort, name_column: &str) -> String {
    let direction = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    match sort.field {
        SortField::Name => format!(" ORDER BY {name_column} COLLATE NOCASE {direction}, uuid ASC"),
        SortField::UpdatedAt => format!(" ORDER BY updated_at {direction}, uuid ASC"),
        SortField::CreatedAt => format!(" ORDER BY created_at {direction}, rowid {direction}"),
    }
}

/// Case-insensitive substring filter; bind the needle through [`crate::repo::query::fold`].
pub(crate) fn contains_clause(column: &str) -> String {
    format!(" AND instr(lower({column}), ?) > 0")
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_millis(value: i64, column: &'static str) -> RepoResult<Timestamp> {
    from_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp `{value}` out of range in {column}"))
    })
}

/// Maps constraint failures of a write to `Conflict`.
pub(crate) fn write_error(kind: EntityKind, err: rusqlite::Error) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(inner, message)
            if inner.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Conflict {
                kind,
                message: message.clone().unwrap_or_else(|| inner.to_string()),
            }
        }
        _ => RepoError::from(err),
    }
}
