//! Database handle: bootstrap, transactions and read scopes.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable handle.
//! - Serialize access so writers never expose partial state to readers.
//!
//! # Invariants
//! - Returned handles have `foreign_keys=ON`.
//! - Returned handles have migrations fully applied.
//! - A closure passed to `transaction` either commits entirely or not at all.

use super::migrations::{self, Migration, MIGRATIONS};
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Migrated SQLite database shared by repositories of one installation.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens (or creates) a database file and applies all built-in migrations.
    ///
    /// # Side effects
    /// - Performs connection bootstrap and migration checks.
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_with_migrations(path, MIGRATIONS)
    }

    /// Opens a database file using a caller-supplied migration list.
    pub fn open_with_migrations(path: impl AsRef<Path>, steps: &[Migration]) -> DbResult<Self> {
        let path = path.as_ref();
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode=file");

        let conn = Connection::open(path)
            .and_then(|conn| configure_connection(&conn).map(|()| conn))
            .map_err(|cause| DbError::Unavailable {
                path: path.to_path_buf(),
                cause,
            });
        let handle = finish_open("file", started_at, conn, steps)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..handle
        })
    }

    /// Opens a private in-memory database and applies all built-in migrations.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_in_memory_with_migrations(MIGRATIONS)
    }

    /// Opens a private in-memory database using a caller-supplied migration list.
    pub fn open_in_memory_with_migrations(steps: &[Migration]) -> DbResult<Self> {
        let started_at = Instant::now();
        info!("event=db_open module=db status=start mode=memory");

        let conn = Connection::open_in_memory()
            .and_then(|conn| configure_connection(&conn).map(|()| conn))
            .map_err(|cause| DbError::Unavailable {
                path: PathBuf::from(":memory:"),
                cause,
            });
        finish_open("memory", started_at, conn, steps)
    }

    /// File backing this handle; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the schema version currently stored in the database.
    pub fn schema_version(&self) -> DbResult<u32> {
        let conn = self.lock();
        migrations::current_version(&conn)
    }

    /// Runs `f` inside one IMMEDIATE write transaction.
    ///
    /// `Ok` commits; `Err` or an unwinding panic rolls back every write issued
    /// inside `f`.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Runs `f` against a consistent snapshot of committed data.
    ///
    /// The read transaction is always rolled back.
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(DbError::from)?;
        f(&tx)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            // The panicking holder dropped its transaction, which rolled back.
            warn!("event=db_lock module=db status=recovered reason=poisoned");
            poisoned.into_inner()
        })
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // Forces a header read so foreign or corrupt files fail here.
    conn.query_row("SELECT count(*) FROM sqlite_master;", [], |row| {
        row.get::<_, i64>(0)
    })?;
    migrations::ensure_version_table(conn)
}

fn finish_open(
    mode: &'static str,
    started_at: Instant,
    conn: DbResult<Connection>,
    steps: &[Migration],
) -> DbResult<Database> {
    let mut conn = match conn {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
    };

    match migrations::migrate(&mut conn, steps) {
        Ok(version) => {
            info!(
                "event=db_open module=db status=ok mode={} schema_version={} duration_ms={}",
                mode,
                version,
                started_at.elapsed().as_millis()
            );
            Ok(Database {
                conn: Mutex::new(conn),
                path: None,
            })
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_migrate_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}
