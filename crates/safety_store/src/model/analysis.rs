//! AI-derived analysis of a processed safety report.
//!
//! # Invariants
//! - `report_id` references an existing report; one analysis per report.
//! - `confidence_score` lies in `[0, 1]`.
//! - The critical-incident policy is defined once, by [`AnalysisResult::is_critical`].

use super::report::ReportId;
use super::{now_epoch_ms, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AnalysisId = Uuid;

/// Incident category assigned by the analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Fire,
    ChemicalExposure,
    Electrical,
    SlipTripFall,
    Equipment,
    Vehicle,
    Ergonomic,
    NearMiss,
    Other,
}

impl IncidentType {
    pub const ALL: [IncidentType; 9] = [
        Self::Fire,
        Self::ChemicalExposure,
        Self::Electrical,
        Self::SlipTripFall,
        Self::Equipment,
        Self::Vehicle,
        Self::Ergonomic,
        Self::NearMiss,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::ChemicalExposure => "chemical_exposure",
            Self::Electrical => "electrical",
            Self::SlipTripFall => "slip_trip_fall",
            Self::Equipment => "equipment",
            Self::Vehicle => "vehicle",
            Self::Ergonomic => "ergonomic",
            Self::NearMiss => "near_miss",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

/// Severity tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// The highest tier; always counts as a critical incident.
    pub const HIGHEST: Severity = Severity::Critical;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|severity| severity.as_str() == value)
    }
}

/// Incident types that are critical regardless of severity.
pub const CRITICAL_INCIDENT_TYPES: [IncidentType; 3] = [
    IncidentType::Fire,
    IncidentType::ChemicalExposure,
    IncidentType::Electrical,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: AnalysisId,
    pub report_id: ReportId,
    pub incident_type: IncidentType,
    pub severity: Severity,
    /// Model confidence in `[0, 1]`.
    pub confidence_score: f64,
    pub summary: Option<String>,
    pub created_date: i64,
}

impl AnalysisResult {
    pub fn new(
        report_id: ReportId,
        incident_type: IncidentType,
        severity: Severity,
        confidence_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            report_id,
            incident_type,
            severity,
            confidence_score,
            summary: None,
            created_date: now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = EntityKind::AnalysisResult;
        if self.id.is_nil() {
            return Err(ValidationError::new(kind, "id", "must not be nil"));
        }
        if self.report_id.is_nil() {
            return Err(ValidationError::new(kind, "report_id", "must not be nil"));
        }
        if !(0.0..=1.0).contains(&self.confidence_score) {
            return Err(ValidationError::new(
                kind,
                "confidence_score",
                format!("{} is outside [0, 1]", self.confidence_score),
            ));
        }
        Ok(())
    }

    /// Critical when severity is the highest tier or the incident type is
    /// one of [`CRITICAL_INCIDENT_TYPES`].
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::HIGHEST || CRITICAL_INCIDENT_TYPES.contains(&self.incident_type)
    }

    /// Returns whether this analysis needs human review at `threshold`.
    pub fn is_low_confidence(&self, threshold: f64) -> bool {
        self.confidence_score < threshold
    }
}
