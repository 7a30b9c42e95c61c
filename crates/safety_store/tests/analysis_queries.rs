use safety_store::{
    AnalysisResult, IncidentType, Priority, Recommendation, SafetyReport, SafetyStore, Severity,
    StoreConfig, StoreError, UnitOfWork,
};
use std::collections::HashSet;
use uuid::Uuid;

fn memory_store(label: &str) -> SafetyStore {
    SafetyStore::open(StoreConfig::memory(format!("{label}-{}", Uuid::new_v4()))).unwrap()
}

/// Stages a report and an analysis of it; returns the analysis.
fn stage_analysis(
    uow: &UnitOfWork,
    incident_type: IncidentType,
    severity: Severity,
    confidence_score: f64,
    created_date: i64,
) -> AnalysisResult {
    let report = SafetyReport::new("incident.pdf", 1_024, "application/pdf", "safety.officer");
    let mut analysis = AnalysisResult::new(report.id, incident_type, severity, confidence_score);
    analysis.created_date = created_date;
    uow.safety_reports().add(report).unwrap();
    uow.analysis_results().add(analysis.clone()).unwrap();
    analysis
}

#[test]
fn low_confidence_is_strictly_below_threshold() {
    let store = memory_store("analysis-low-confidence");
    let mut uow = store.unit_of_work().unwrap();
    let low = stage_analysis(&uow, IncidentType::NearMiss, Severity::Low, 0.3, 1_000);
    stage_analysis(&uow, IncidentType::NearMiss, Severity::Low, 0.5, 2_000);
    stage_analysis(&uow, IncidentType::NearMiss, Severity::Low, 0.7, 3_000);
    uow.save_changes().unwrap();

    let flagged = uow
        .analysis_results()
        .get_analysis_with_low_confidence(0.5)
        .unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, low.id);
    assert!(flagged[0].is_low_confidence(0.5));
}

#[test]
fn critical_incidents_follow_the_shared_policy() {
    let store = memory_store("analysis-critical");
    let mut uow = store.unit_of_work().unwrap();
    let staged = vec![
        stage_analysis(&uow, IncidentType::Fire, Severity::Low, 0.9, 1_000),
        stage_analysis(&uow, IncidentType::Equipment, Severity::Critical, 0.9, 2_000),
        stage_analysis(&uow, IncidentType::SlipTripFall, Severity::High, 0.9, 3_000),
        stage_analysis(&uow, IncidentType::Electrical, Severity::Medium, 0.9, 4_000),
        stage_analysis(&uow, IncidentType::ChemicalExposure, Severity::Low, 0.9, 5_000),
        stage_analysis(&uow, IncidentType::Ergonomic, Severity::Medium, 0.9, 6_000),
    ];
    uow.save_changes().unwrap();

    let expected: HashSet<_> = staged
        .iter()
        .filter(|analysis| analysis.is_critical())
        .map(|analysis| analysis.id)
        .collect();
    let critical = uow.analysis_results().get_critical_incidents().unwrap();
    let actual: HashSet<_> = critical.iter().map(|analysis| analysis.id).collect();

    assert_eq!(expected.len(), 4);
    assert_eq!(actual, expected);
}

#[test]
fn filters_by_incident_type_and_severity() {
    let store = memory_store("analysis-filters");
    let mut uow = store.unit_of_work().unwrap();
    stage_analysis(&uow, IncidentType::Vehicle, Severity::High, 0.8, 1_000);
    stage_analysis(&uow, IncidentType::Vehicle, Severity::Low, 0.8, 2_000);
    stage_analysis(&uow, IncidentType::Fire, Severity::High, 0.8, 3_000);
    uow.save_changes().unwrap();

    let analyses = uow.analysis_results();
    let vehicle = analyses.get_by_incident_type(IncidentType::Vehicle).unwrap();
    assert_eq!(vehicle.len(), 2);
    assert_eq!(vehicle[0].created_date, 2_000);

    let high = analyses.get_by_severity(Severity::High).unwrap();
    assert_eq!(high.len(), 2);
    assert!(high.iter().all(|analysis| analysis.severity == Severity::High));
    assert!(analyses.get_by_severity(Severity::Critical).unwrap().is_empty());
}

#[test]
fn date_range_and_report_lookup() {
    let store = memory_store("analysis-range");
    let mut uow = store.unit_of_work().unwrap();
    let first = stage_analysis(&uow, IncidentType::Other, Severity::Low, 0.6, 1_000);
    let second = stage_analysis(&uow, IncidentType::Other, Severity::Low, 0.6, 2_000);
    stage_analysis(&uow, IncidentType::Other, Severity::Low, 0.6, 3_000);
    uow.save_changes().unwrap();

    let analyses = uow.analysis_results();
    let ids: Vec<_> = analyses
        .get_by_date_range(1_000, 2_000)
        .unwrap()
        .into_iter()
        .map(|analysis| analysis.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let by_report = analyses.get_by_report_id(first.report_id).unwrap().unwrap();
    assert_eq!(by_report.id, first.id);
    assert!(analyses.get_by_report_id(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn analysis_with_recommendations_is_eagerly_loaded() {
    let store = memory_store("analysis-eager");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow, IncidentType::Fire, Severity::High, 0.95, 1_000);
    let other = stage_analysis(&uow, IncidentType::Vehicle, Severity::Low, 0.95, 2_000);
    let drill = Recommendation::new(analysis.id, "Run a fire drill", Priority::Medium, "Safety Officer");
    uow.recommendations().add(drill.clone()).unwrap();
    uow.recommendations()
        .add(Recommendation::new(other.id, "Add mirrors", Priority::Low, "Site Manager"))
        .unwrap();
    uow.save_changes().unwrap();

    let loaded = uow
        .analysis_results()
        .get_analysis_with_recommendations(analysis.id)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.analysis.id, analysis.id);
    assert_eq!(loaded.recommendations, vec![drill]);

    assert!(uow
        .analysis_results()
        .get_analysis_with_recommendations(Uuid::new_v4())
        .unwrap()
        .is_none());
}

#[test]
fn out_of_range_confidence_is_rejected_before_staging() {
    let store = memory_store("analysis-invalid");
    let uow = store.unit_of_work().unwrap();
    let analysis = AnalysisResult::new(Uuid::new_v4(), IncidentType::Fire, Severity::Low, 1.5);
    assert!(uow.analysis_results().add(analysis).is_err());
    assert!(!uow.has_pending_changes());
}

#[test]
fn analysis_is_frozen_after_creation() {
    let store = memory_store("analysis-frozen");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow, IncidentType::Fire, Severity::High, 0.9, 1_000);
    uow.save_changes().unwrap();

    let mut rescored = uow.analysis_results().get_by_id(analysis.id).unwrap().unwrap();
    rescored.severity = Severity::Low;
    let err = uow.analysis_results().update(rescored).unwrap_err();
    assert!(matches!(err, StoreError::Validation(ref v) if v.field == "severity"));

    let unchanged = uow.analysis_results().get_by_id(analysis.id).unwrap().unwrap();
    uow.analysis_results().update(unchanged).unwrap();
    assert_eq!(
        uow.analysis_results().get_by_severity(Severity::High).unwrap(),
        vec![analysis]
    );
}

#[test]
fn report_lookup_skips_a_staged_removal() {
    let store = memory_store("analysis-report-removed");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow, IncidentType::Electrical, Severity::Medium, 0.7, 1_000);
    uow.save_changes().unwrap();

    uow.analysis_results().remove(&analysis).unwrap();
    assert!(uow
        .analysis_results()
        .get_by_report_id(analysis.report_id)
        .unwrap()
        .is_none());
    let with_analysis = uow
        .safety_reports()
        .get_report_with_analysis(analysis.report_id)
        .unwrap()
        .unwrap();
    assert!(with_analysis.analysis.is_none());
}
