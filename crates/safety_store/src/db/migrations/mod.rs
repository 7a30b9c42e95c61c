//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - The pending set is re-read inside the write transaction, so concurrent
//!   bootstrappers never apply the same step twice.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_safety_reports",
        sql: include_str!("0001_safety_reports.sql"),
    },
    Migration {
        version: 2,
        description: "create_analysis_results",
        sql: include_str!("0002_analysis_results.sql"),
    },
    Migration {
        version: 3,
        description: "create_recommendations",
        sql: include_str!("0003_recommendations.sql"),
    },
    Migration {
        version: 4,
        description: "add_query_indexes",
        sql: include_str!("0004_query_indexes.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Returns the number of migrations applied; `0` when already current.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let latest = latest_version();
    if check_version(schema_version(conn)?, latest)? == latest {
        return Ok(0);
    }

    let started_at = Instant::now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current_version = check_version(schema_version(&tx)?, latest)?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            "event=schema_migrate module=db status=start version={} name={}",
            migration.version, migration.description
        );
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        applied += 1;
    }
    tx.commit()?;

    info!(
        "event=schema_migrate module=db status=ok from={} to={} applied={} duration_ms={}",
        current_version,
        latest,
        applied,
        started_at.elapsed().as_millis()
    );
    Ok(applied)
}

/// Reads the schema version recorded in `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn check_version(current: u32, latest: u32) -> DbResult<u32> {
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    Ok(current)
}
