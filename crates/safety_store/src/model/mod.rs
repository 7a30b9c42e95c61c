//! Domain records for safety reports, their analyses and recommendations.
//!
//! # Responsibility
//! - Define the three persisted records and their enumerated fields.
//! - Own field validation and lifecycle transition rules.
//!
//! # Invariants
//! - Every record is identified by a stable `Uuid` that is never reused.
//! - Timestamps are Unix epoch milliseconds.
//! - Reports are soft-deleted via `is_active`, never hard-deleted.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod analysis;
pub mod recommendation;
pub mod report;

/// Identifies which record type an error or staged change refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    SafetyReport,
    AnalysisResult,
    Recommendation,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SafetyReport => "safety_report",
            Self::AnalysisResult => "analysis_result",
            Self::Recommendation => "recommendation",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation failure raised before a record is staged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {entity}.{field}: {message}")]
pub struct ValidationError {
    pub entity: EntityKind,
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(entity: EntityKind, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            entity,
            field,
            message: message.into(),
        }
    }
}

/// Returns the current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(crate) fn require_text(
    entity: EntityKind,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(entity, field, "must not be empty"));
    }
    Ok(())
}
