//! Process-scoped entry point.
//!
//! # Responsibility
//! - Own the database factory and its schema initializer.
//! - Hand out independent units of work, bootstrapping the schema first.
//!
//! # Invariants
//! - The schema is bootstrapped before the first unit of work connects.
//! - A store is `Send + Sync`; share it behind an `Arc`.

use crate::config::{DatabaseLocation, StoreConfig};
use crate::db::{Database, SchemaInitializer};
use crate::error::StoreResult;
use crate::logging::init_logging;
use crate::seed::{scenario_marker_id, seed_scenario, SeedSummary};
use crate::uow::UnitOfWork;
use log::info;
use std::sync::Arc;

pub struct SafetyStore {
    database: Arc<Database>,
    initializer: SchemaInitializer,
}

impl SafetyStore {
    /// Builds a store for `config` without touching the schema.
    ///
    /// Starts file logging first when `config.logging` is set.
    ///
    /// # Errors
    /// - `Logging` when the log settings are invalid or conflict with the
    ///   logging already active in this process.
    /// - `Storage` when an in-memory database cannot be opened.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        if let Some(settings) = &config.logging {
            init_logging(settings)?;
        }
        let database = Arc::new(Database::new(&config)?);
        let initializer = SchemaInitializer::new(Arc::clone(&database), config.profile);
        let location = match config.location {
            DatabaseLocation::File(_) => "file",
            DatabaseLocation::Memory(_) => "memory",
        };
        info!(
            "event=store_open module=store status=ok location={} profile={}",
            location,
            config.profile.as_str()
        );
        Ok(Self {
            database,
            initializer,
        })
    }

    /// Same as [`SafetyStore::open`] for a `key=value;` connection string.
    pub fn from_connection_string(value: &str) -> StoreResult<Self> {
        Self::open(StoreConfig::from_connection_string(value)?)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn initializer(&self) -> &SchemaInitializer {
        &self.initializer
    }

    /// Opens a new unit of work on its own connection.
    ///
    /// # Errors
    /// - `Initialization` when the first-use bootstrap fails.
    /// - `Storage` when the connection cannot be opened.
    pub fn unit_of_work(&self) -> StoreResult<UnitOfWork> {
        self.initializer.initialize()?;
        let conn = self.database.connect()?;
        Ok(UnitOfWork::new(conn))
    }

    /// Seeds the fixed demo scenario once and commits it.
    ///
    /// Returns an empty summary when the scenario is already present.
    pub fn seed_test_data(&self) -> StoreResult<SeedSummary> {
        let mut uow = self.unit_of_work()?;
        if uow.safety_reports().exists(scenario_marker_id())? {
            info!("event=seed_scenario module=seed status=skipped reason=already_seeded");
            return Ok(SeedSummary::default());
        }

        uow.begin_transaction()?;
        let summary = seed_scenario(&uow)?;
        uow.commit_transaction()?;
        uow.close()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::SafetyStore;
    use crate::config::{DatabaseLocation, StoreConfig};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn store_is_shareable_across_threads() {
        assert_send_sync::<SafetyStore>();
    }

    #[test]
    fn first_unit_of_work_bootstraps_schema_once() {
        let store = SafetyStore::open(StoreConfig::memory("store-bootstrap-once"))
            .expect("store should open");
        assert!(!store.initializer().is_initialized());

        drop(store.unit_of_work().expect("first unit of work"));
        drop(store.unit_of_work().expect("second unit of work"));

        assert!(store.initializer().is_initialized());
        assert_eq!(store.initializer().bootstrap_runs(), 1);
    }

    #[test]
    fn seed_test_data_is_idempotent() {
        let store = SafetyStore::open(StoreConfig::memory("store-seed-idempotent"))
            .expect("store should open");

        let first = store.seed_test_data().expect("first seed");
        assert_eq!(first.reports, 6);
        assert_eq!(first.analyses, 3);
        assert_eq!(first.recommendations, 4);

        let second = store.seed_test_data().expect("second seed");
        assert_eq!(second.reports, 0);
    }
}
