//! Deterministic seed data for tests and non-production environments.
//!
//! # Responsibility
//! - Produce byte-level document fixtures with real magic-number headers.
//! - Stage bulk reports and a fixed report/analysis/recommendation scenario.
//!
//! # Invariants
//! - Identical inputs always produce identical ids, timestamps and bytes.
//! - Seeding only stages changes; callers decide when to save or commit.
//! - Not part of the production bootstrap path.

use crate::error::StoreResult;
use crate::model::analysis::{AnalysisResult, IncidentType, Severity};
use crate::model::recommendation::{Priority, Recommendation, RecommendationStatus};
use crate::model::report::{ProcessingStatus, ReportId, SafetyReport};
use crate::uow::UnitOfWork;
use log::info;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

pub const PDF_MAGIC: [u8; 4] = *b"%PDF";
pub const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];
pub const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// Upload time of the first seeded report (2024-01-01T00:00:00Z).
pub const SEED_EPOCH_MS: i64 = 1_704_067_200_000;
const HOUR_MS: i64 = 60 * 60 * 1_000;
const MINUTE_MS: i64 = 60 * 1_000;

const BULK_ID_BASE: u128 = 0x5eed_0000_0000_4000_8000_0000_0000_0000;
const SCENARIO_ID_BASE: u128 = 0x5eed_ffff_0000_4000_8000_0000_0000_0000;

const SEED_USERS: [&str; 3] = ["inspector.alvarez", "supervisor.chen", "safety.officer"];
const SEED_TEXTS: [&str; 4] = [
    "Forklift reversed into pallet rack near dock 4; no injuries.",
    "Solvent spill in paint shop, area ventilated and cordoned.",
    "Exposed wiring found behind panel B12 during inspection.",
    "Worker slipped on wet floor at canteen entrance.",
];

#[derive(Debug, Clone, Copy)]
enum FixtureKind {
    Pdf,
    Png,
    Jpeg,
}

impl FixtureKind {
    const ROTATION: [FixtureKind; 3] = [Self::Pdf, Self::Png, Self::Jpeg];

    fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    fn bytes(self, len: usize) -> Vec<u8> {
        match self {
            Self::Pdf => pdf_fixture(len),
            Self::Png => png_fixture(len),
            Self::Jpeg => jpeg_fixture(len),
        }
    }
}

/// PDF-like payload of `len` bytes; never shorter than its header.
pub fn pdf_fixture(len: usize) -> Vec<u8> {
    fixture(PDF_MAGIC, len)
}

/// PNG-like payload of `len` bytes; never shorter than its header.
pub fn png_fixture(len: usize) -> Vec<u8> {
    fixture(PNG_MAGIC, len)
}

/// JPEG-like payload of `len` bytes; never shorter than its header.
pub fn jpeg_fixture(len: usize) -> Vec<u8> {
    fixture(JPEG_MAGIC, len)
}

fn fixture(magic: [u8; 4], len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len.max(magic.len()));
    bytes.extend_from_slice(&magic);
    let filler = (magic.len()..len).map(|offset| (offset.wrapping_mul(31).wrapping_add(7) % 251) as u8);
    bytes.extend(filler);
    bytes
}

/// Counts of records staged by a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub reports: usize,
    pub analyses: usize,
    pub recommendations: usize,
}

/// Id of the `index`-th bulk-seeded report.
pub fn seeded_report_id(index: usize) -> ReportId {
    Uuid::from_u128(BULK_ID_BASE + index as u128)
}

/// Stages `count` deterministic reports and returns their ids in upload order.
///
/// Report `i` is uploaded `i` hours after [`SEED_EPOCH_MS`]; users, content
/// types and processing states rotate.
pub fn seed_reports(uow: &UnitOfWork, count: usize) -> StoreResult<Vec<ReportId>> {
    let started_at = Instant::now();
    let reports = uow.safety_reports();
    let mut ids = Vec::with_capacity(count);
    for index in 0..count {
        ids.push(reports.add(bulk_report(index))?);
    }
    info!(
        "event=seed_reports module=seed status=ok count={} duration_ms={}",
        count,
        started_at.elapsed().as_millis()
    );
    Ok(ids)
}

fn bulk_report(index: usize) -> SafetyReport {
    let kind = FixtureKind::ROTATION[index % FixtureKind::ROTATION.len()];
    let payload_len = 512 + (index % 7) * 128;
    let uploaded_date = SEED_EPOCH_MS + index as i64 * HOUR_MS;

    let mut report = SafetyReport::with_id(
        seeded_report_id(index),
        format!("incident-{:04}.{}", index + 1, kind.extension()),
        kind.bytes(payload_len).len() as i64,
        kind.content_type(),
        SEED_USERS[index % SEED_USERS.len()],
        uploaded_date,
    );

    report.status = ProcessingStatus::ALL[index % ProcessingStatus::ALL.len()];
    if report.status.is_terminal() {
        report.processed_date = Some(uploaded_date + 10 * MINUTE_MS);
    }
    match report.status {
        ProcessingStatus::Completed | ProcessingStatus::RequiresReview => {
            report.extracted_text = Some(SEED_TEXTS[index % SEED_TEXTS.len()].to_string());
        }
        ProcessingStatus::Failed => {
            report.error_message = Some("text extraction timed out".to_string());
        }
        ProcessingStatus::Pending | ProcessingStatus::Processing => {}
    }
    report
}

fn scenario_id(offset: u128) -> Uuid {
    Uuid::from_u128(SCENARIO_ID_BASE + offset)
}

/// Id of the first report of the fixed scenario; present once it was seeded.
pub fn scenario_marker_id() -> ReportId {
    scenario_id(1)
}

/// Stages the fixed demo scenario: one report per processing state, three
/// analyses and four recommendations.
pub fn seed_scenario(uow: &UnitOfWork) -> StoreResult<SeedSummary> {
    let started_at = Instant::now();
    let reports = uow.safety_reports();
    let analyses = uow.analysis_results();
    let recommendations = uow.recommendations();
    let mut summary = SeedSummary::default();

    let fire = scenario_report(1, "warehouse-fire.pdf", FixtureKind::Pdf, ProcessingStatus::Completed, 0);
    let spill = scenario_report(2, "lab-spill.jpg", FixtureKind::Jpeg, ProcessingStatus::Completed, 1);
    let press = scenario_report(3, "press-guard.png", FixtureKind::Png, ProcessingStatus::RequiresReview, 2);
    let pending = scenario_report(4, "loading-bay.pdf", FixtureKind::Pdf, ProcessingStatus::Pending, 3);
    let processing = scenario_report(5, "ladder.png", FixtureKind::Png, ProcessingStatus::Processing, 4);
    let failed = scenario_report(6, "scan-unreadable.jpg", FixtureKind::Jpeg, ProcessingStatus::Failed, 5);

    let fire_analysis = scenario_analysis(11, &fire, IncidentType::Fire, Severity::High, 0.92);
    let spill_analysis = scenario_analysis(12, &spill, IncidentType::SlipTripFall, Severity::Low, 0.45);
    let press_analysis = scenario_analysis(13, &press, IncidentType::Equipment, Severity::Critical, 0.61);

    let mut in_progress = scenario_recommendation(
        23,
        &press_analysis,
        "Lock out the press until the guard interlock is replaced",
        Priority::Urgent,
        "Maintenance Lead",
    );
    in_progress.status = RecommendationStatus::InProgress;
    in_progress.updated_date = Some(in_progress.created_date + HOUR_MS);

    let scenario_recommendations = [
        scenario_recommendation(
            21,
            &fire_analysis,
            "Inspect sprinkler heads in aisles 3 to 6",
            Priority::Urgent,
            "Facilities Manager",
        ),
        scenario_recommendation(
            22,
            &fire_analysis,
            "Run a refresher fire drill for the night shift",
            Priority::Medium,
            "Safety Officer",
        ),
        in_progress,
        scenario_recommendation(
            24,
            &spill_analysis,
            "Add anti-slip matting at the lab entrance",
            Priority::Low,
            "Safety Officer",
        ),
    ];

    for report in [fire, spill, press, pending, processing, failed] {
        reports.add(report)?;
        summary.reports += 1;
    }
    for analysis in [fire_analysis, spill_analysis, press_analysis] {
        analyses.add(analysis)?;
        summary.analyses += 1;
    }
    for recommendation in scenario_recommendations {
        recommendations.add(recommendation)?;
        summary.recommendations += 1;
    }

    info!(
        "event=seed_scenario module=seed status=ok reports={} analyses={} recommendations={} duration_ms={}",
        summary.reports,
        summary.analyses,
        summary.recommendations,
        started_at.elapsed().as_millis()
    );
    Ok(summary)
}

fn scenario_report(
    offset: u128,
    file_name: &str,
    kind: FixtureKind,
    status: ProcessingStatus,
    hours_after_epoch: i64,
) -> SafetyReport {
    let uploaded_date = SEED_EPOCH_MS + hours_after_epoch * HOUR_MS;
    let mut report = SafetyReport::with_id(
        scenario_id(offset),
        file_name,
        kind.bytes(2_048).len() as i64,
        kind.content_type(),
        SEED_USERS[(offset as usize) % SEED_USERS.len()],
        uploaded_date,
    );
    report.status = status;
    if status.is_terminal() {
        report.processed_date = Some(uploaded_date + 15 * MINUTE_MS);
    }
    match status {
        ProcessingStatus::Completed | ProcessingStatus::RequiresReview => {
            report.extracted_text = Some(SEED_TEXTS[(offset as usize) % SEED_TEXTS.len()].to_string());
        }
        ProcessingStatus::Failed => {
            report.error_message = Some("document could not be decoded".to_string());
        }
        ProcessingStatus::Pending | ProcessingStatus::Processing => {}
    }
    report
}

fn scenario_analysis(
    offset: u128,
    report: &SafetyReport,
    incident_type: IncidentType,
    severity: Severity,
    confidence_score: f64,
) -> AnalysisResult {
    let mut analysis = AnalysisResult::new(report.id, incident_type, severity, confidence_score);
    analysis.id = scenario_id(offset);
    analysis.created_date = report.processed_date.unwrap_or(report.uploaded_date);
    analysis.summary = report.extracted_text.clone();
    analysis
}

fn scenario_recommendation(
    offset: u128,
    analysis: &AnalysisResult,
    description: &str,
    priority: Priority,
    responsible_role: &str,
) -> Recommendation {
    let mut recommendation = Recommendation::new(analysis.id, description, priority, responsible_role);
    recommendation.id = scenario_id(offset);
    recommendation.created_date = analysis.created_date + (offset as i64) * MINUTE_MS;
    recommendation
}
