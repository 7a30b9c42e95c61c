use safety_store::{
    AnalysisResult, IncidentType, Priority, Recommendation, RecommendationStatus, SafetyReport,
    SafetyStore, Severity, StoreConfig, StoreError, UnitOfWork,
};
use uuid::Uuid;

fn memory_store(label: &str) -> SafetyStore {
    SafetyStore::open(StoreConfig::memory(format!("{label}-{}", Uuid::new_v4()))).unwrap()
}

fn stage_analysis(uow: &UnitOfWork) -> AnalysisResult {
    let report = SafetyReport::new("incident.png", 4_096, "image/png", "supervisor.chen");
    let analysis = AnalysisResult::new(report.id, IncidentType::Equipment, Severity::Medium, 0.8);
    uow.safety_reports().add(report).unwrap();
    uow.analysis_results().add(analysis.clone()).unwrap();
    analysis
}

fn recommendation(
    analysis: &AnalysisResult,
    description: &str,
    priority: Priority,
    role: &str,
    created_date: i64,
) -> Recommendation {
    let mut recommendation = Recommendation::new(analysis.id, description, priority, role);
    recommendation.created_date = created_date;
    recommendation
}

#[test]
fn recommendations_by_analysis_ignore_insertion_order() {
    let store = memory_store("recommendations-by-analysis");
    let mut uow = store.unit_of_work().unwrap();
    let target = stage_analysis(&uow);
    let unrelated = stage_analysis(&uow);

    let routine = recommendation(&target, "Refresh signage", Priority::Low, "Site Manager", 1_000);
    let urgent = recommendation(&target, "Replace guard", Priority::Urgent, "Maintenance Lead", 2_000);
    uow.recommendations().add(routine.clone()).unwrap();
    uow.recommendations()
        .add(recommendation(&unrelated, "Retrain", Priority::High, "Trainer", 1_500))
        .unwrap();
    uow.recommendations().add(urgent.clone()).unwrap();
    uow.save_changes().unwrap();

    let found = uow
        .recommendations()
        .get_recommendations_by_analysis_id(target.id)
        .unwrap();
    assert_eq!(found, vec![urgent, routine]);
}

#[test]
fn responsible_role_matches_ignoring_case() {
    let store = memory_store("recommendations-role");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow);
    uow.recommendations()
        .add(recommendation(&analysis, "Walk the floor", Priority::Medium, "Site Manager", 1_000))
        .unwrap();
    uow.recommendations()
        .add(recommendation(&analysis, "Audit PPE", Priority::Medium, "Safety Officer", 2_000))
        .unwrap();
    uow.save_changes().unwrap();

    let found = uow.recommendations().get_by_responsible_role("site manager").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].responsible_role, "Site Manager");
}

#[test]
fn status_and_priority_filters() {
    let store = memory_store("recommendations-status");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow);
    let started = recommendation(&analysis, "Fix latch", Priority::High, "Maintenance Lead", 1_000);
    uow.recommendations().add(started.clone()).unwrap();
    uow.recommendations()
        .add(recommendation(&analysis, "Log near miss", Priority::Low, "Safety Officer", 2_000))
        .unwrap();
    uow.save_changes().unwrap();
    assert_eq!(uow.recommendations().get_pending_recommendations().unwrap().len(), 2);

    let mut loaded = uow.recommendations().get_by_id(started.id).unwrap().unwrap();
    loaded.set_status(RecommendationStatus::InProgress).unwrap();
    uow.recommendations().update(loaded).unwrap();
    uow.save_changes().unwrap();

    let recommendations = uow.recommendations();
    let pending = recommendations.get_pending_recommendations().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].priority, Priority::Low);

    let in_progress = recommendations
        .get_by_status(RecommendationStatus::InProgress)
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert!(in_progress[0].updated_date.is_some());

    assert_eq!(recommendations.get_by_priority(Priority::High).unwrap().len(), 1);
    assert!(recommendations.get_by_priority(Priority::Urgent).unwrap().is_empty());
}

#[test]
fn completed_recommendation_cannot_reopen() {
    let store = memory_store("recommendations-reopen");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow);
    let mut done = recommendation(&analysis, "Fence pit", Priority::Urgent, "Site Manager", 1_000);
    done.set_status(RecommendationStatus::InProgress).unwrap();
    done.set_status(RecommendationStatus::Completed).unwrap();
    uow.recommendations().add(done.clone()).unwrap();
    uow.save_changes().unwrap();

    let mut reopened = done;
    reopened.status = RecommendationStatus::Pending;
    assert!(matches!(
        uow.recommendations().update(reopened),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn critical_fire_scenario_links_both_recommendations() {
    let store = memory_store("recommendations-fire-scenario");
    let mut uow = store.unit_of_work().unwrap();
    let report = SafetyReport::new("boiler-room.pdf", 8_192, "application/pdf", "supervisor.chen");
    let analysis = AnalysisResult::new(report.id, IncidentType::Fire, Severity::Critical, 0.97);
    let low = recommendation(&analysis, "Replace extinguisher tags", Priority::Low, "Site Manager", 1_000);
    let high = recommendation(&analysis, "Clear the fire exit", Priority::High, "Site Manager", 2_000);

    uow.begin_transaction().unwrap();
    uow.recommendations().add(low.clone()).unwrap();
    uow.safety_reports().add(report).unwrap();
    uow.recommendations().add(high.clone()).unwrap();
    uow.analysis_results().add(analysis.clone()).unwrap();
    uow.commit_transaction().unwrap();

    let critical = uow.analysis_results().get_critical_incidents().unwrap();
    assert!(critical.iter().any(|found| found.id == analysis.id));

    let linked = uow
        .recommendations()
        .get_recommendations_by_analysis_id(analysis.id)
        .unwrap();
    assert_eq!(linked, vec![high, low]);
}

#[test]
fn status_queries_follow_staged_updates() {
    let store = memory_store("recommendations-staged-status");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow);
    let started = recommendation(&analysis, "Fix latch", Priority::High, "Maintenance Lead", 1_000);
    let waiting = recommendation(&analysis, "Log near miss", Priority::Low, "Safety Officer", 2_000);
    uow.recommendations().add(started.clone()).unwrap();
    uow.recommendations().add(waiting.clone()).unwrap();
    uow.save_changes().unwrap();

    let recommendations = uow.recommendations();
    let mut loaded = recommendations.get_by_id(started.id).unwrap().unwrap();
    loaded.set_status(RecommendationStatus::InProgress).unwrap();
    recommendations.update(loaded.clone()).unwrap();

    assert_eq!(recommendations.get_pending_recommendations().unwrap(), vec![waiting]);
    assert_eq!(
        recommendations
            .get_by_status(RecommendationStatus::InProgress)
            .unwrap(),
        vec![loaded]
    );
}

#[test]
fn only_status_changes_after_creation() {
    let store = memory_store("recommendations-frozen");
    let mut uow = store.unit_of_work().unwrap();
    let analysis = stage_analysis(&uow);
    let original = recommendation(&analysis, "Fence pit", Priority::High, "Site Manager", 1_000);
    uow.recommendations().add(original.clone()).unwrap();
    uow.save_changes().unwrap();

    let mut reassigned = uow.recommendations().get_by_id(original.id).unwrap().unwrap();
    reassigned.responsible_role = "Night Supervisor".to_string();
    assert!(matches!(
        uow.recommendations().update(reassigned),
        Err(StoreError::Validation(ref v)) if v.field == "responsible_role"
    ));

    let mut reworded = uow.recommendations().get_by_id(original.id).unwrap().unwrap();
    reworded.description = "Cover pit".to_string();
    assert!(matches!(
        uow.recommendations().update(reworded),
        Err(StoreError::Validation(ref v)) if v.field == "description"
    ));
}
