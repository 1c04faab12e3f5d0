use journal_core::db::migrations::{latest_version, Migration};
use journal_core::db::{Database, DbError};
use journal_core::RepoError;
use rusqlite::{Connection, Transaction};

#[test]
fn open_in_memory_applies_all_migrations() {
    let db = Database::open_in_memory().unwrap();

    assert_eq!(db.schema_version().unwrap(), latest_version());
    db.read(|conn| -> Result<(), DbError> {
        for table in [
            "campaigns",
            "characters",
            "entries",
            "campaign_tags",
            "entry_tags",
            "schema_version",
        ] {
            assert_table_exists(conn, table);
        }
        assert_eq!(user_version(conn), latest_version());
        Ok(())
    })
    .unwrap();
}

#[test]
fn reopening_same_file_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.sqlite3");

    let first = Database::open(&path).unwrap();
    assert_eq!(first.schema_version().unwrap(), latest_version());
    assert_eq!(first.path(), Some(path.as_path()));
    drop(first);

    let second = Database::open(&path).unwrap();
    assert_eq!(second.schema_version().unwrap(), latest_version());
}

#[test]
fn newer_schema_on_disk_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match Database::open(&path) {
        Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must be rejected"),
    }
}

#[test]
fn corrupt_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.sqlite3");
    std::fs::write(&path, vec![0x5a_u8; 8192]).unwrap();

    match Database::open(&path) {
        Err(DbError::Unavailable { path: reported, .. }) => assert_eq!(reported, path),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("corrupt file must not open"),
    }
}

#[test]
fn failed_step_leaves_previous_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sqlite3");
    let steps = [
        Migration {
            version: 1,
            name: "create_a",
            apply: create_a,
        },
        Migration {
            version: 2,
            name: "broken",
            apply: create_b_then_fail,
        },
    ];

    match Database::open_with_migrations(&path, &steps) {
        Err(DbError::MigrationFailed {
            from_version,
            to_version,
            ..
        }) => {
            assert_eq!(from_version, 1);
            assert_eq!(to_version, 2);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("broken step must fail"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(user_version(&conn), 1);
    assert_table_exists(&conn, "a");
    assert!(!table_exists(&conn, "b"));
}

#[test]
fn combined_step_matches_sequential_steps() {
    let dir = tempfile::tempdir().unwrap();
    let sequential_path = dir.path().join("sequential.sqlite3");
    let combined_path = dir.path().join("combined.sqlite3");
    let base = Migration {
        version: 1,
        name: "create_a",
        apply: create_a,
    };
    let sequential = [
        base,
        Migration {
            version: 2,
            name: "add_label",
            apply: add_label,
        },
        Migration {
            version: 3,
            name: "index_label",
            apply: index_label,
        },
    ];
    let combined = [
        base,
        Migration {
            version: 3,
            name: "label_with_index",
            apply: add_label_with_index,
        },
    ];

    for path in [&sequential_path, &combined_path] {
        drop(Database::open_with_migrations(path, &[base]).unwrap());
    }
    let sequential_db = Database::open_with_migrations(&sequential_path, &sequential).unwrap();
    let combined_db = Database::open_with_migrations(&combined_path, &combined).unwrap();

    assert_eq!(sequential_db.schema_version().unwrap(), 3);
    assert_eq!(combined_db.schema_version().unwrap(), 3);
    assert_eq!(schema_dump(&sequential_db), schema_dump(&combined_db));
}

#[test]
fn unordered_plan_is_rejected() {
    let steps = [
        Migration {
            version: 2,
            name: "second",
            apply: create_a,
        },
        Migration {
            version: 1,
            name: "first",
            apply: add_label,
        },
    ];

    assert!(matches!(
        Database::open_in_memory_with_migrations(&steps),
        Err(DbError::InvalidMigrationPlan(_))
    ));
}

#[test]
fn failed_transaction_rolls_back_every_write() {
    let db = Database::open_in_memory().unwrap();

    let result = db.transaction(|tx| -> Result<(), RepoError> {
        tx.execute(
            "INSERT INTO campaigns (uuid, name, created_at, updated_at)
             VALUES ('c1', 'Doomed', 0, 0);",
            [],
        )?;
        Err(RepoError::InvalidData("abort".to_string()))
    });
    assert!(result.is_err());

    let count = db
        .read(|conn| -> Result<i64, DbError> {
            Ok(conn.query_row("SELECT COUNT(*) FROM campaigns;", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn foreign_keys_are_enforced() {
    let db = Database::open_in_memory().unwrap();

    let result = db.transaction(|tx| -> Result<(), DbError> {
        tx.execute(
            "INSERT INTO characters (uuid, campaign_uuid, name, created_at, updated_at)
             VALUES ('x', 'missing', 'Orphan', 0, 0);",
            [],
        )?;
        Ok(())
    });
    assert!(matches!(result, Err(DbError::Sqlite(_))));
}

fn create_a(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("CREATE TABLE a (id INTEGER PRIMARY KEY);")
}

fn create_b_then_fail(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("CREATE TABLE b (id INTEGER PRIMARY KEY);")?;
    tx.execute_batch("INSERT INTO missing_table VALUES (1);")
}

fn add_label(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("ALTER TABLE a ADD COLUMN label TEXT NOT NULL DEFAULT '';")
}

fn index_label(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch("CREATE INDEX idx_a_label ON a (label);")
}

fn add_label_with_index(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    add_label(tx)?;
    index_label(tx)
}

fn schema_dump(db: &Database) -> Vec<(String, String, Option<String>)> {
    db.read(|conn| -> Result<Vec<(String, String, Option<String>)>, DbError> {
        let mut stmt = conn.prepare(
            "SELECT type, name, sql FROM sqlite_master
             WHERE name NOT LIKE 'sqlite_%'
             ORDER BY type, name;",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .unwrap()
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "missing table `{table_name}`");
}
