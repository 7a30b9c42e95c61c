//! Remediation recommendation attached to an analysis.

use super::analysis::AnalysisId;
use super::{now_epoch_ms, require_text, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecommendationId = Uuid;

/// Workflow state of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RecommendationStatus {
    pub const ALL: [RecommendationStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Pending => matches!(next, Self::InProgress | Self::Rejected),
            Self::InProgress => matches!(next, Self::Completed | Self::Rejected),
            Self::Completed | Self::Rejected => false,
        }
    }
}

/// Urgency of a recommendation, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == value)
    }

    /// Sort key used by SQL ordering; larger is more urgent.
    pub(crate) fn rank(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub analysis_id: AnalysisId,
    pub description: String,
    pub priority: Priority,
    /// Role accountable for carrying the recommendation out, e.g. `Site Manager`.
    pub responsible_role: String,
    pub status: RecommendationStatus,
    pub created_date: i64,
    pub updated_date: Option<i64>,
}

impl Recommendation {
    pub fn new(
        analysis_id: AnalysisId,
        description: impl Into<String>,
        priority: Priority,
        responsible_role: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            analysis_id,
            description: description.into(),
            priority,
            responsible_role: responsible_role.into(),
            status: RecommendationStatus::Pending,
            created_date: now_epoch_ms(),
            updated_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = EntityKind::Recommendation;
        if self.id.is_nil() {
            return Err(ValidationError::new(kind, "id", "must not be nil"));
        }
        if self.analysis_id.is_nil() {
            return Err(ValidationError::new(kind, "analysis_id", "must not be nil"));
        }
        require_text(kind, "description", &self.description)?;
        require_text(kind, "responsible_role", &self.responsible_role)?;
        Ok(())
    }

    /// Applies a workflow status change and stamps `updated_date`.
    pub fn set_status(&mut self, next: RecommendationStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::new(
                EntityKind::Recommendation,
                "status",
                format!(
                    "cannot move from `{}` to `{}`",
                    self.status.as_str(),
                    next.as_str()
                ),
            ));
        }
        self.status = next;
        self.updated_date = Some(now_epoch_ms().max(self.created_date));
        Ok(())
    }
}
