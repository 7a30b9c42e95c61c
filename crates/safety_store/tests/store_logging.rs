use safety_store::{
    flush_logs, logging_status, LogSettings, LoggingError, SafetyReport, SafetyStore,
    StoreConfig, StoreError,
};
use std::path::{Path, PathBuf};
use uuid::Uuid;

// The logger outlives the test, so the directory is left in place.
fn log_dir() -> PathBuf {
    std::env::temp_dir().join(format!("safety-store-logs-{}", Uuid::new_v4()))
}

fn read_logs(dir: &Path) -> String {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .map(|path| std::fs::read_to_string(path).unwrap())
        .collect()
}

#[test]
fn configured_store_writes_metadata_only_events() {
    let dir = log_dir();
    let db_dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::file(db_dir.path().join("logged.db"))
        .with_logging(LogSettings::new(&dir).with_level("info"));
    let store = SafetyStore::open(config).unwrap();
    assert_eq!(logging_status(), Some(("info", dir.clone())));

    let mut uow = store.unit_of_work().unwrap();
    let mut report = SafetyReport::new("logged.pdf", 64, "application/pdf", "safety.officer");
    report.extracted_text = Some("Confidential: scaffold collapse on level 3".to_string());
    uow.safety_reports().add(report).unwrap();
    uow.save_changes().unwrap();
    uow.close().unwrap();
    flush_logs();

    let logs = read_logs(&dir);
    assert!(logs.contains("event=logging_init"));
    assert!(logs.contains("event=store_open module=store status=ok location=file"));
    assert!(logs.contains("event=uow_save"));
    assert!(!logs.contains("scaffold collapse"));

    let conflicting = StoreConfig::memory(format!("logged-{}", Uuid::new_v4()))
        .with_logging(LogSettings::new(log_dir()).with_level("info"));
    assert!(matches!(
        SafetyStore::open(conflicting),
        Err(StoreError::Logging(LoggingError::Conflict { setting: "directory", .. }))
    ));

    let from_string = SafetyStore::from_connection_string(&format!(
        "Data Source=:memory:;Name=logged-{};Log Dir={};Log Level=info",
        Uuid::new_v4(),
        dir.display()
    ));
    assert!(from_string.is_ok());
}
