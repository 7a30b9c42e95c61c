//! Connection factory for one configured database location.
//!
//! # Responsibility
//! - Open file or shared-cache in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Provide existence management (create/drop/exists) for the location.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - An in-memory database lives as long as its `Database` value.

use super::migrations::{apply_migrations, schema_version};
use super::{DbError, DbResult};
use crate::config::{DatabaseLocation, StoreConfig};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct Database {
    location: DatabaseLocation,
    busy_timeout: Duration,
    /// Holds the shared-cache in-memory database open; `None` for files.
    keepalive: Mutex<Option<Connection>>,
}

impl Database {
    /// Builds a factory for `config.location` without touching the schema.
    pub fn new(config: &StoreConfig) -> DbResult<Self> {
        let database = Self {
            location: config.location.clone(),
            busy_timeout: config.busy_timeout(),
            keepalive: Mutex::new(None),
        };
        if matches!(database.location, DatabaseLocation::Memory(_)) {
            let conn = database.connect()?;
            *database.lock_keepalive()? = Some(conn);
        }
        Ok(database)
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Opens a new configured connection.
    ///
    /// # Side effects
    /// - Creates the database file when it does not exist yet.
    /// - Emits `db_open` logging events with duration and status.
    pub fn connect(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.mode();

        let conn = match Connection::open(self.open_target()) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        match self.configure(&conn) {
            Ok(()) => {
                info!(
                    "event=db_open module=db status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_configure_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Returns whether the database exists.
    ///
    /// A file database exists when its file does; an in-memory database
    /// exists once a schema has been applied to it.
    pub fn exists(&self) -> DbResult<bool> {
        match &self.location {
            DatabaseLocation::File(path) => Ok(path.is_file()),
            DatabaseLocation::Memory(_) => {
                let keepalive = self.lock_keepalive()?;
                match keepalive.as_ref() {
                    Some(conn) => Ok(schema_version(conn)? > 0),
                    None => Ok(false),
                }
            }
        }
    }

    /// Ensures the database exists, creating an empty one when absent.
    ///
    /// Returns `true` when the database was newly created.
    pub fn create(&self) -> DbResult<bool> {
        let existed = self.exists()?;
        if let DatabaseLocation::File(path) = &self.location {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| DbError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            drop(self.connect()?);
        }
        if !existed {
            info!("event=db_create module=db status=ok mode={}", self.mode());
        }
        Ok(!existed)
    }

    /// Applies all pending migrations; returns how many were applied.
    pub fn migrate(&self) -> DbResult<u32> {
        let mut conn = self.connect()?;
        apply_migrations(&mut conn)
    }

    /// Removes the database. Idempotent: dropping a missing database is a no-op.
    ///
    /// Returns `true` when something was removed.
    pub fn drop_database(&self) -> DbResult<bool> {
        let existed = self.exists()?;
        match &self.location {
            DatabaseLocation::File(path) => {
                for candidate in sidecar_paths(path) {
                    remove_if_present(&candidate)?;
                }
            }
            DatabaseLocation::Memory(_) => {
                let keepalive = self.lock_keepalive()?;
                if let Some(conn) = keepalive.as_ref() {
                    drop_all_tables(conn)?;
                }
            }
        }
        if existed {
            info!("event=db_drop module=db status=ok mode={}", self.mode());
        }
        Ok(existed)
    }

    fn configure(&self, conn: &Connection) -> DbResult<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(self.busy_timeout)?;
        if matches!(self.location, DatabaseLocation::File(_)) {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        Ok(())
    }

    fn open_target(&self) -> String {
        match &self.location {
            DatabaseLocation::File(path) => path.to_string_lossy().into_owned(),
            DatabaseLocation::Memory(name) => format!("file:{name}?mode=memory&cache=shared"),
        }
    }

    fn mode(&self) -> &'static str {
        match self.location {
            DatabaseLocation::File(_) => "file",
            DatabaseLocation::Memory(_) => "memory",
        }
    }

    fn lock_keepalive(&self) -> DbResult<std::sync::MutexGuard<'_, Option<Connection>>> {
        self.keepalive.lock().map_err(|_| DbError::LockPoisoned)
    }
}

fn sidecar_paths(path: &Path) -> Vec<std::path::PathBuf> {
    let base = path.as_os_str().to_os_string();
    let mut paths = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut candidate = base.clone();
        candidate.push(suffix);
        paths.push(candidate.into());
    }
    paths
}

fn remove_if_present(path: &Path) -> DbResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DbError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn drop_all_tables(conn: &Connection) -> DbResult<()> {
    let tables = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%';",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        names
    };

    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    for table in &tables {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{table}\";"))?;
    }
    conn.execute_batch("PRAGMA user_version = 0; PRAGMA foreign_keys = ON;")?;
    Ok(())
}
