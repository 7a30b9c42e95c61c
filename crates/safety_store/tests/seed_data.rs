use safety_store::seed::{
    jpeg_fixture, pdf_fixture, png_fixture, seed_reports, seeded_report_id, SEED_EPOCH_MS,
};
use safety_store::{
    IncidentType, ProcessingStatus, RecommendationStatus, SafetyReport, SafetyStore, Severity,
    StoreConfig,
};
use uuid::Uuid;

fn memory_store(label: &str) -> SafetyStore {
    SafetyStore::open(StoreConfig::memory(format!("{label}-{}", Uuid::new_v4()))).unwrap()
}

#[test]
fn fixtures_carry_expected_magic_numbers() {
    assert!(pdf_fixture(128).starts_with(b"%PDF"));
    assert!(png_fixture(128).starts_with(&[0x89, b'P', b'N', b'G']));
    assert!(jpeg_fixture(128).starts_with(&[0xFF, 0xD8, 0xFF, 0xE0]));
    assert_eq!(pdf_fixture(128)[4..], png_fixture(128)[4..]);
}

fn seed_and_load(store: &SafetyStore) -> (Vec<Uuid>, Vec<SafetyReport>) {
    let mut uow = store.unit_of_work().unwrap();
    let ids = seed_reports(&uow, 12).unwrap();
    uow.save_changes().unwrap();
    let reports = uow.safety_reports().get_all_reports().unwrap();
    (ids, reports)
}

#[test]
fn bulk_seeding_is_deterministic_across_stores() {
    let first = memory_store("seed-deterministic-a");
    let second = memory_store("seed-deterministic-b");

    let (first_ids, first_reports) = seed_and_load(&first);
    let (second_ids, second_reports) = seed_and_load(&second);

    assert_eq!(first_ids, second_ids);
    assert_eq!(first_ids[0], seeded_report_id(0));
    assert_eq!(first_reports, second_reports);
    assert_eq!(first_reports.last().unwrap().uploaded_date, SEED_EPOCH_MS);
}

#[test]
fn seeded_reports_rotate_content_types_and_statuses() {
    let store = memory_store("seed-rotation");
    let mut uow = store.unit_of_work().unwrap();
    seed_reports(&uow, 6).unwrap();
    uow.save_changes().unwrap();

    let reports = uow.safety_reports();
    let first = reports.get_by_id(seeded_report_id(0)).unwrap().unwrap();
    let second = reports.get_by_id(seeded_report_id(1)).unwrap().unwrap();
    let third = reports.get_by_id(seeded_report_id(2)).unwrap().unwrap();
    assert_eq!(first.content_type, "application/pdf");
    assert_eq!(second.content_type, "image/png");
    assert_eq!(third.content_type, "image/jpeg");
    assert_eq!(third.status, ProcessingStatus::Completed);
    assert!(third.processed_date.unwrap() > third.uploaded_date);

    let counts = reports.count_by_status().unwrap();
    assert_eq!(counts[&ProcessingStatus::Pending], 2);
    assert_eq!(counts[&ProcessingStatus::Failed], 1);
}

#[test]
fn seed_test_data_builds_the_demo_scenario() {
    let store = memory_store("seed-scenario");
    let summary = store.seed_test_data().unwrap();
    assert_eq!(summary.reports, 6);
    assert_eq!(summary.analyses, 3);
    assert_eq!(summary.recommendations, 4);

    let uow = store.unit_of_work().unwrap();
    let counts = uow.safety_reports().count_by_status().unwrap();
    assert!(ProcessingStatus::ALL
        .iter()
        .all(|status| counts[status] >= 1));

    let critical = uow.analysis_results().get_critical_incidents().unwrap();
    assert_eq!(critical.len(), 2);
    assert!(critical
        .iter()
        .any(|analysis| analysis.incident_type == IncidentType::Fire));
    assert!(critical
        .iter()
        .any(|analysis| analysis.severity == Severity::Critical));

    let low_confidence = uow
        .analysis_results()
        .get_analysis_with_low_confidence(0.5)
        .unwrap();
    assert_eq!(low_confidence.len(), 1);

    let in_progress = uow
        .recommendations()
        .get_by_status(RecommendationStatus::InProgress)
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(uow.recommendations().get_pending_recommendations().unwrap().len(), 3);

    assert_eq!(store.seed_test_data().unwrap().reports, 0);
}
