//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for one configured location.
//! - Apply schema migrations in deterministic order.
//! - Guard one-time schema bootstrap per store.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No repository reads or writes data before the initializer succeeded.

use std::path::PathBuf;

mod initializer;
pub mod migrations;
mod open;

pub use initializer::SchemaInitializer;
pub use open::Database;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid persisted data: {0}")]
    InvalidData(String),

    #[error("database lock poisoned")]
    LockPoisoned,
}
