//! Safety report record.
//!
//! # Responsibility
//! - Describe one uploaded incident document and its processing state.
//! - Enforce the processing lifecycle and soft-delete semantics.
//!
//! # Invariants
//! - `status` only moves Pending -> Processing -> {Completed|Failed|RequiresReview}.
//! - `processed_date` is never earlier than `uploaded_date`.
//! - `is_active == false` marks a soft-deleted report; it stays addressable by id.

use super::{now_epoch_ms, require_text, EntityKind, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ReportId = Uuid;

static CONTENT_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]+/[a-z0-9][a-z0-9.+\-]*$").expect("valid content type regex")
});

/// Processing state of an uploaded report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    RequiresReview,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::RequiresReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::RequiresReview => "requires_review",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// Returns whether processing has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RequiresReview)
    }

    /// Returns whether `next` is a legal successor of `self`.
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Pending => next == Self::Processing,
            Self::Processing => next.is_terminal(),
            Self::Completed | Self::Failed | Self::RequiresReview => false,
        }
    }
}

/// One uploaded safety-incident document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyReport {
    pub id: ReportId,
    pub file_name: String,
    /// Size of the uploaded payload in bytes.
    pub file_size: i64,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Text extracted by the processing pipeline; `None` until processed.
    pub extracted_text: Option<String>,
    pub status: ProcessingStatus,
    pub uploaded_by: String,
    pub uploaded_date: i64,
    pub processed_date: Option<i64>,
    /// Set when processing fails.
    pub error_message: Option<String>,
    pub is_active: bool,
}

impl SafetyReport {
    /// Creates a pending, active report uploaded now.
    pub fn new(
        file_name: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            file_name,
            file_size,
            content_type,
            uploaded_by,
            now_epoch_ms(),
        )
    }

    /// Creates a pending, active report with caller-provided identity and upload time.
    pub fn with_id(
        id: ReportId,
        file_name: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
        uploaded_by: impl Into<String>,
        uploaded_date: i64,
    ) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            file_size,
            content_type: content_type.into(),
            extracted_text: None,
            status: ProcessingStatus::Pending,
            uploaded_by: uploaded_by.into(),
            uploaded_date,
            processed_date: None,
            error_message: None,
            is_active: true,
        }
    }

    /// Validates required fields before the report is staged.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = EntityKind::SafetyReport;
        if self.id.is_nil() {
            return Err(ValidationError::new(kind, "id", "must not be nil"));
        }
        require_text(kind, "file_name", &self.file_name)?;
        require_text(kind, "uploaded_by", &self.uploaded_by)?;
        if self.file_size < 0 {
            return Err(ValidationError::new(kind, "file_size", "must not be negative"));
        }
        if !CONTENT_TYPE_RE.is_match(&self.content_type) {
            return Err(ValidationError::new(
                kind,
                "content_type",
                format!("`{}` is not a MIME type", self.content_type),
            ));
        }
        if let Some(processed) = self.processed_date {
            if processed < self.uploaded_date {
                return Err(ValidationError::new(
                    kind,
                    "processed_date",
                    "must not be earlier than uploaded_date",
                ));
            }
        }
        Ok(())
    }

    /// Moves the report to `next`, rejecting lifecycle regressions.
    pub fn transition_to(&mut self, next: ProcessingStatus) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::new(
                EntityKind::SafetyReport,
                "status",
                format!(
                    "cannot move from `{}` to `{}`",
                    self.status.as_str(),
                    next.as_str()
                ),
            ));
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), ValidationError> {
        self.transition_to(ProcessingStatus::Processing)
    }

    /// Records a successful processing pass.
    pub fn complete(&mut self, extracted_text: impl Into<String>) -> Result<(), ValidationError> {
        self.transition_to(ProcessingStatus::Completed)?;
        self.extracted_text = Some(extracted_text.into());
        self.processed_date = Some(now_epoch_ms().max(self.uploaded_date));
        Ok(())
    }

    /// Records a failed processing pass.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ValidationError> {
        self.transition_to(ProcessingStatus::Failed)?;
        self.error_message = Some(message.into());
        self.processed_date = Some(now_epoch_ms().max(self.uploaded_date));
        Ok(())
    }

    /// Marks this report as soft-deleted.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}
