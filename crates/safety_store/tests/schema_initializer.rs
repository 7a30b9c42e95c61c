use safety_store::seed::seed_reports;
use safety_store::{InitProfile, SafetyStore, StoreConfig, StoreError};
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;

fn memory_config(label: &str) -> StoreConfig {
    StoreConfig::memory(format!("{label}-{}", Uuid::new_v4()))
}

#[test]
fn concurrent_first_use_bootstraps_exactly_once() {
    const THREADS: usize = 8;
    let store = Arc::new(SafetyStore::open(memory_config("init-race")).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.initializer().initialize()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(store.initializer().is_initialized());
    assert_eq!(store.initializer().bootstrap_runs(), 1);
}

#[test]
fn failed_bootstrap_is_retried_on_next_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("retry.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    let store = SafetyStore::open(StoreConfig::file(&path)).unwrap();
    let initializer = store.initializer();

    assert!(matches!(
        initializer.initialize(),
        Err(StoreError::Initialization { .. })
    ));
    assert!(!initializer.is_initialized());

    assert!(initializer.drop_database().unwrap());
    initializer.initialize().unwrap();
    assert!(initializer.is_initialized());
    assert_eq!(initializer.bootstrap_runs(), 2);
}

#[test]
fn create_and_drop_database_report_what_changed() {
    let dir = tempfile::tempdir().unwrap();
    let store = SafetyStore::open(StoreConfig::file(dir.path().join("ops.db"))).unwrap();
    let initializer = store.initializer();

    assert!(!initializer.database_exists().unwrap());
    assert!(initializer.create_database().unwrap());
    assert!(!initializer.create_database().unwrap());
    assert!(initializer.database_exists().unwrap());

    assert!(initializer.drop_database().unwrap());
    assert!(!initializer.drop_database().unwrap());
    assert!(!initializer.database_exists().unwrap());
}

#[test]
fn drop_database_resets_initialized_state() {
    let store = SafetyStore::open(memory_config("init-reset")).unwrap();
    store.initializer().initialize().unwrap();

    store.initializer().drop_database().unwrap();
    assert!(!store.initializer().is_initialized());

    let uow = store.unit_of_work().unwrap();
    assert_eq!(uow.safety_reports().count().unwrap(), 0);
    assert_eq!(store.initializer().bootstrap_runs(), 2);
}

#[test]
fn recreate_profile_starts_from_an_empty_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recreate.db");

    {
        let store = SafetyStore::open(StoreConfig::file(&path)).unwrap();
        let mut uow = store.unit_of_work().unwrap();
        seed_reports(&uow, 3).unwrap();
        uow.save_changes().unwrap();
        assert_eq!(uow.safety_reports().count().unwrap(), 3);
    }

    let kept = SafetyStore::open(StoreConfig::file(&path)).unwrap();
    assert_eq!(kept.unit_of_work().unwrap().safety_reports().count().unwrap(), 3);
    drop(kept);

    let store =
        SafetyStore::open(StoreConfig::file(&path).with_profile(InitProfile::Recreate)).unwrap();
    let uow = store.unit_of_work().unwrap();
    assert_eq!(uow.safety_reports().count().unwrap(), 0);
}

#[test]
fn connection_string_selects_location_and_profile() {
    let name = format!("conn-string-{}", Uuid::new_v4());
    let store =
        SafetyStore::from_connection_string(&format!("Mode=Memory; Name={name}; Profile=recreate"))
            .unwrap();
    assert_eq!(store.initializer().profile(), InitProfile::Recreate);
    store.initializer().initialize().unwrap();
    assert!(store.initializer().database_exists().unwrap());

    assert!(matches!(
        SafetyStore::from_connection_string("Busy Timeout=10"),
        Err(StoreError::Config(_))
    ));
}
