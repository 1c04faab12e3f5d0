//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations, one transaction per step.
//!
//! # Invariants
//! - `version` values must remain strictly increasing and non-zero.
//! - A failed step leaves the database at the version reached before it.
//! - Applied version is stored in `schema_version` and mirrored to
//!   `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fmt::{Debug, Formatter};
use std::time::Instant;

/// Schema transform applied inside the step's transaction.
pub type MigrationFn = fn(&Transaction<'_>) -> rusqlite::Result<()>;

/// One versioned schema transform.
#[derive(Clone, Copy)]
pub struct Migration {
    /// Version the database reports after this step commits.
    pub version: u32,
    /// Short label used in logs.
    pub name: &'static str,
    pub apply: MigrationFn,
}

impl Debug for Migration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Built-in migration sequence for the journal schema.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        apply: create_entity_tables,
    },
    Migration {
        version: 2,
        name: "tags",
        apply: create_tag_tables,
    },
    Migration {
        version: 3,
        name: "list_indexes",
        apply: create_list_indexes,
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    target_version(MIGRATIONS)
}

/// Applies the steps of `steps` newer than the stored version.
///
/// Returns the schema version after migration.
///
/// # Errors
/// - `InvalidMigrationPlan` when versions are zero or not strictly increasing.
/// - `UnsupportedSchemaVersion` when the stored version is newer than the plan.
/// - `MigrationFailed` when one step fails; that step is rolled back.
pub fn migrate(conn: &mut Connection, steps: &[Migration]) -> DbResult<u32> {
    validate_plan(steps)?;
    ensure_version_table(conn)?;

    let stored = current_version(conn)?;
    let target = target_version(steps);
    if stored > target {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: target,
        });
    }

    let mut reached = stored;
    for migration in steps.iter().filter(|step| step.version > stored) {
        let started_at = Instant::now();
        if let Err(cause) = run_step(conn, migration) {
            error!(
                "event=db_migrate module=db status=error name={} from_version={} to_version={} duration_ms={} error={}",
                migration.name,
                reached,
                migration.version,
                started_at.elapsed().as_millis(),
                cause
            );
            return Err(DbError::MigrationFailed {
                from_version: reached,
                to_version: migration.version,
                cause,
            });
        }
        info!(
            "event=db_migrate module=db status=ok name={} from_version={} to_version={} duration_ms={}",
            migration.name,
            reached,
            migration.version,
            started_at.elapsed().as_millis()
        );
        reached = migration.version;
    }

    Ok(reached)
}

/// Reads the stored schema version.
///
/// Databases created before the `schema_version` row existed fall back to
/// `PRAGMA user_version`.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    let has_table: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'
        );",
        [],
        |row| row.get(0),
    )?;
    if has_table == 1 {
        let stored = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1;",
                [],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        if let Some(version) = stored {
            return Ok(version);
        }
    }

    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

pub(crate) fn ensure_version_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );",
    )
}

fn run_step(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    (migration.apply)(&tx)?;
    tx.execute(
        "INSERT INTO schema_version (id, version) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version;",
        params![migration.version],
    )?;
    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    tx.commit()
}

fn target_version(steps: &[Migration]) -> u32 {
    steps.last().map_or(0, |migration| migration.version)
}

fn validate_plan(steps: &[Migration]) -> DbResult<()> {
    let mut previous = 0;
    for migration in steps {
        if migration.version <= previous {
            return Err(DbError::InvalidMigrationPlan(format!(
                "step `{}` has version {} after version {}",
                migration.name, migration.version, previous
            )));
        }
        previous = migration.version;
    }
    Ok(())
}

fn create_entity_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE campaigns (
            uuid TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE characters (
            uuid TEXT PRIMARY KEY NOT NULL,
            campaign_uuid TEXT NOT NULL REFERENCES campaigns (uuid),
            name TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE entries (
            uuid TEXT PRIMARY KEY NOT NULL,
            campaign_uuid TEXT NOT NULL REFERENCES campaigns (uuid),
            character_uuid TEXT REFERENCES characters (uuid),
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    )
}

fn create_tag_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE TABLE campaign_tags (
            campaign_uuid TEXT NOT NULL REFERENCES campaigns (uuid) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (campaign_uuid, tag)
        );

        CREATE TABLE entry_tags (
            entry_uuid TEXT NOT NULL REFERENCES entries (uuid) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (entry_uuid, tag)
        );",
    )
}

fn create_list_indexes(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(
        "CREATE INDEX idx_campaigns_updated ON campaigns (updated_at);
        CREATE INDEX idx_characters_campaign ON characters (campaign_uuid);
        CREATE INDEX idx_entries_campaign_updated ON entries (campaign_uuid, updated_at);
        CREATE INDEX idx_entries_character ON entries (character_uuid);
        CREATE INDEX idx_campaign_tags_tag ON campaign_tags (tag);
        CREATE INDEX idx_entry_tags_tag ON entry_tags (tag);",
    )
}
