//! One-time schema bootstrap for a store.
//!
//! # Responsibility
//! - Ensure the database exists and is migrated before first use.
//! - Offer existence-management primitives for test and ops tooling.
//!
//! # Invariants
//! - `initialize` runs the bootstrap at most once successfully per initializer;
//!   concurrent callers are serialized by the state mutex.
//! - A failed bootstrap leaves the initializer uninitialized; the next call
//!   retries from scratch.
//! - `drop_database` resets the initialized state.

use super::Database;
use crate::config::InitProfile;
use crate::error::{StoreError, StoreResult};
use log::{error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct InitState {
    initialized: bool,
    bootstrap_runs: u32,
}

pub struct SchemaInitializer {
    database: Arc<Database>,
    profile: InitProfile,
    state: Mutex<InitState>,
}

impl SchemaInitializer {
    pub fn new(database: Arc<Database>, profile: InitProfile) -> Self {
        Self {
            database,
            profile,
            state: Mutex::new(InitState::default()),
        }
    }

    pub fn profile(&self) -> InitProfile {
        self.profile
    }

    /// Brings the database to the latest schema version once.
    ///
    /// Subsequent calls are no-ops. Callers racing the first call block
    /// until it finishes and then observe its outcome.
    ///
    /// # Errors
    /// - `StoreError::Initialization` when creation, drop or migration fails;
    ///   the initializer stays uninitialized.
    pub fn initialize(&self) -> StoreResult<()> {
        let mut state = self.lock_state();
        if state.initialized {
            return Ok(());
        }

        let started_at = Instant::now();
        info!(
            "event=schema_init module=db status=start profile={}",
            self.profile.as_str()
        );
        state.bootstrap_runs += 1;

        match self.bootstrap() {
            Ok(applied) => {
                state.initialized = true;
                info!(
                    "event=schema_init module=db status=ok profile={} applied={} duration_ms={}",
                    self.profile.as_str(),
                    applied,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=schema_init module=db status=error profile={} duration_ms={} error={}",
                    self.profile.as_str(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock_state().initialized
    }

    /// Number of times the bootstrap actually ran, failed attempts included.
    pub fn bootstrap_runs(&self) -> u32 {
        self.lock_state().bootstrap_runs
    }

    /// Creates the database when absent and applies pending migrations.
    ///
    /// Independent of the initialized flag. Returns `true` when the database
    /// did not exist before.
    pub fn create_database(&self) -> StoreResult<bool> {
        let created = self
            .database
            .create()
            .map_err(|err| StoreError::initialization("create", err))?;
        self.database
            .migrate()
            .map_err(|err| StoreError::initialization("migrate", err))?;
        Ok(created)
    }

    /// Drops the database; a missing database is not an error.
    ///
    /// Returns `true` when something was removed.
    pub fn drop_database(&self) -> StoreResult<bool> {
        let mut state = self.lock_state();
        let dropped = self.database.drop_database()?;
        state.initialized = false;
        Ok(dropped)
    }

    pub fn database_exists(&self) -> StoreResult<bool> {
        Ok(self.database.exists()?)
    }

    fn bootstrap(&self) -> StoreResult<u32> {
        if self.profile == InitProfile::Recreate {
            self.database
                .drop_database()
                .map_err(|err| StoreError::initialization("drop", err))?;
        }
        self.database
            .create()
            .map_err(|err| StoreError::initialization("create", err))?;
        self.database
            .migrate()
            .map_err(|err| StoreError::initialization("migrate", err))
    }

    fn lock_state(&self) -> MutexGuard<'_, InitState> {
        // The flag only flips after a complete bootstrap, so a poisoned
        // guard still holds a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
