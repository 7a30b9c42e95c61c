//! Table mapping for the persisted records.
//!
//! # Responsibility
//! - Describe each record's table, columns and soft-delete column.
//! - Convert records to bind values and decode rows back.
//!
//! # Invariants
//! - `COLUMNS[0]` is always the `uuid` primary key.
//! - Decoding rejects invalid persisted state instead of masking it.

use crate::db::{DbError, DbResult};
use crate::model::analysis::{AnalysisResult, IncidentType, Severity};
use crate::model::recommendation::{Priority, Recommendation, RecommendationStatus};
use crate::model::report::{ProcessingStatus, SafetyReport};
use crate::model::{EntityKind, ValidationError};
use crate::uow::session::{ChangeSet, EntityChanges};
use rusqlite::types::Value;
use rusqlite::Row;
use std::cmp::Ordering;
use std::fmt::Debug;
use uuid::Uuid;

/// A record type that a [`Repository`](super::Repository) can manage.
pub trait Entity: Clone + Debug + Sized + 'static {
    const KIND: EntityKind;
    const TABLE: &'static str;
    /// Persisted columns; the first is the `uuid` primary key.
    const COLUMNS: &'static [&'static str];
    /// `ORDER BY` clause used when a query does not specify one.
    const DEFAULT_ORDER: &'static str;
    /// Column holding the soft-delete flag, for types that are never hard-deleted.
    const ACTIVE_COLUMN: Option<&'static str> = None;

    /// In-memory equivalent of `DEFAULT_ORDER`.
    fn default_cmp(left: &Self, right: &Self) -> Ordering;

    fn id(&self) -> Uuid;

    /// Field validation run before any insert or update is staged.
    fn validate_entity(&self) -> Result<(), ValidationError>;

    /// Rejects illegal changes relative to the last value known in the session.
    fn check_change(&self, _previous: &Self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn is_active(&self) -> bool {
        true
    }

    /// Applies soft-delete state; no-op for hard-deleted types.
    fn mark_removed(&mut self) {}

    /// Bind values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> DbResult<Self>;

    #[doc(hidden)]
    fn changes(set: &ChangeSet) -> &EntityChanges<Self>;

    #[doc(hidden)]
    fn changes_mut(set: &mut ChangeSet) -> &mut EntityChanges<Self>;
}

pub(crate) fn select_sql<T: Entity>() -> String {
    format!("SELECT {} FROM {}", T::COLUMNS.join(", "), T::TABLE)
}

pub(crate) fn insert_sql<T: Entity>() -> String {
    let placeholders = (1..=T::COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders});",
        T::TABLE,
        T::COLUMNS.join(", ")
    )
}

pub(crate) fn update_sql<T: Entity>() -> String {
    let assignments = T::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(index, column)| format!("{column} = ?{}", index + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {assignments} WHERE uuid = ?1;", T::TABLE)
}

pub(crate) fn remove_sql<T: Entity>() -> String {
    match T::ACTIVE_COLUMN {
        Some(column) => format!("UPDATE {} SET {column} = 0 WHERE uuid = ?1;", T::TABLE),
        None => format!("DELETE FROM {} WHERE uuid = ?1;", T::TABLE),
    }
}

impl Entity for SafetyReport {
    const KIND: EntityKind = EntityKind::SafetyReport;
    const TABLE: &'static str = "safety_reports";
    const COLUMNS: &'static [&'static str] = &[
        "uuid",
        "file_name",
        "file_size",
        "content_type",
        "extracted_text",
        "status",
        "uploaded_by",
        "uploaded_date",
        "processed_date",
        "error_message",
        "is_active",
    ];
    const DEFAULT_ORDER: &'static str = "uploaded_date DESC, uuid ASC";
    const ACTIVE_COLUMN: Option<&'static str> = Some("is_active");

    fn default_cmp(left: &Self, right: &Self) -> Ordering {
        right
            .uploaded_date
            .cmp(&left.uploaded_date)
            .then_with(|| left.id.cmp(&right.id))
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_entity(&self) -> Result<(), ValidationError> {
        self.validate()
    }

    fn check_change(&self, previous: &Self) -> Result<(), ValidationError> {
        if !previous.status.can_transition_to(self.status) {
            return Err(ValidationError::new(
                Self::KIND,
                "status",
                format!(
                    "cannot move from `{}` to `{}`",
                    previous.status.as_str(),
                    self.status.as_str()
                ),
            ));
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn mark_removed(&mut self) {
        self.deactivate();
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.file_name.clone()),
            Value::Integer(self.file_size),
            Value::Text(self.content_type.clone()),
            opt_text(self.extracted_text.as_deref()),
            Value::Text(self.status.as_str().to_string()),
            Value::Text(self.uploaded_by.clone()),
            Value::Integer(self.uploaded_date),
            opt_integer(self.processed_date),
            opt_text(self.error_message.as_deref()),
            Value::Integer(bool_to_int(self.is_active)),
        ]
    }

    fn from_row(row: &Row<'_>) -> DbResult<Self> {
        let status_text: String = row.get("status")?;
        let status = ProcessingStatus::parse(&status_text).ok_or_else(|| {
            invalid_column(Self::TABLE, "status", &status_text)
        })?;

        Ok(Self {
            id: parse_uuid(row, Self::TABLE, "uuid")?,
            file_name: row.get("file_name")?,
            file_size: row.get("file_size")?,
            content_type: row.get("content_type")?,
            extracted_text: row.get("extracted_text")?,
            status,
            uploaded_by: row.get("uploaded_by")?,
            uploaded_date: row.get("uploaded_date")?,
            processed_date: row.get("processed_date")?,
            error_message: row.get("error_message")?,
            is_active: parse_bool(row, Self::TABLE, "is_active")?,
        })
    }

    fn changes(set: &ChangeSet) -> &EntityChanges<Self> {
        &set.reports
    }

    fn changes_mut(set: &mut ChangeSet) -> &mut EntityChanges<Self> {
        &mut set.reports
    }
}

impl Entity for AnalysisResult {
    const KIND: EntityKind = EntityKind::AnalysisResult;
    const TABLE: &'static str = "analysis_results";
    const COLUMNS: &'static [&'static str] = &[
        "uuid",
        "report_uuid",
        "incident_type",
        "severity",
        "confidence_score",
        "summary",
        "created_date",
    ];
    const DEFAULT_ORDER: &'static str = "created_date DESC, uuid ASC";

    fn default_cmp(left: &Self, right: &Self) -> Ordering {
        right
            .created_date
            .cmp(&left.created_date)
            .then_with(|| left.id.cmp(&right.id))
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_entity(&self) -> Result<(), ValidationError> {
        self.validate()
    }

    /// Analyses are immutable once persisted.
    fn check_change(&self, previous: &Self) -> Result<(), ValidationError> {
        let kind = Self::KIND;
        unchanged(kind, "report_id", self.report_id == previous.report_id)?;
        unchanged(kind, "incident_type", self.incident_type == previous.incident_type)?;
        unchanged(kind, "severity", self.severity == previous.severity)?;
        unchanged(
            kind,
            "confidence_score",
            self.confidence_score.to_bits() == previous.confidence_score.to_bits(),
        )?;
        unchanged(kind, "summary", self.summary == previous.summary)?;
        unchanged(kind, "created_date", self.created_date == previous.created_date)
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.report_id.to_string()),
            Value::Text(self.incident_type.as_str().to_string()),
            Value::Text(self.severity.as_str().to_string()),
            Value::Real(self.confidence_score),
            opt_text(self.summary.as_deref()),
            Value::Integer(self.created_date),
        ]
    }

    fn from_row(row: &Row<'_>) -> DbResult<Self> {
        let type_text: String = row.get("incident_type")?;
        let incident_type = IncidentType::parse(&type_text)
            .ok_or_else(|| invalid_column(Self::TABLE, "incident_type", &type_text))?;
        let severity_text: String = row.get("severity")?;
        let severity = Severity::parse(&severity_text)
            .ok_or_else(|| invalid_column(Self::TABLE, "severity", &severity_text))?;

        Ok(Self {
            id: parse_uuid(row, Self::TABLE, "uuid")?,
            report_id: parse_uuid(row, Self::TABLE, "report_uuid")?,
            incident_type,
            severity,
            confidence_score: row.get("confidence_score")?,
            summary: row.get("summary")?,
            created_date: row.get("created_date")?,
        })
    }

    fn changes(set: &ChangeSet) -> &EntityChanges<Self> {
        &set.analyses
    }

    fn changes_mut(set: &mut ChangeSet) -> &mut EntityChanges<Self> {
        &mut set.analyses
    }
}

impl Entity for Recommendation {
    const KIND: EntityKind = EntityKind::Recommendation;
    const TABLE: &'static str = "recommendations";
    const COLUMNS: &'static [&'static str] = &[
        "uuid",
        "analysis_uuid",
        "description",
        "priority",
        "priority_rank",
        "responsible_role",
        "status",
        "created_date",
        "updated_date",
    ];
    const DEFAULT_ORDER: &'static str = "priority_rank DESC, created_date ASC, uuid ASC";

    fn default_cmp(left: &Self, right: &Self) -> Ordering {
        right
            .priority
            .rank()
            .cmp(&left.priority.rank())
            .then_with(|| left.created_date.cmp(&right.created_date))
            .then_with(|| left.id.cmp(&right.id))
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_entity(&self) -> Result<(), ValidationError> {
        self.validate()
    }

    /// Only the workflow status (and its `updated_date` stamp) may change.
    fn check_change(&self, previous: &Self) -> Result<(), ValidationError> {
        let kind = Self::KIND;
        unchanged(kind, "analysis_id", self.analysis_id == previous.analysis_id)?;
        unchanged(kind, "description", self.description == previous.description)?;
        unchanged(kind, "priority", self.priority == previous.priority)?;
        unchanged(
            kind,
            "responsible_role",
            self.responsible_role == previous.responsible_role,
        )?;
        unchanged(kind, "created_date", self.created_date == previous.created_date)?;
        if !previous.status.can_transition_to(self.status) {
            return Err(ValidationError::new(
                kind,
                "status",
                format!(
                    "cannot move from `{}` to `{}`",
                    previous.status.as_str(),
                    self.status.as_str()
                ),
            ));
        }
        Ok(())
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.analysis_id.to_string()),
            Value::Text(self.description.clone()),
            Value::Text(self.priority.as_str().to_string()),
            Value::Integer(self.priority.rank()),
            Value::Text(self.responsible_role.clone()),
            Value::Text(self.status.as_str().to_string()),
            Value::Integer(self.created_date),
            opt_integer(self.updated_date),
        ]
    }

    fn from_row(row: &Row<'_>) -> DbResult<Self> {
        let priority_text: String = row.get("priority")?;
        let priority = Priority::parse(&priority_text)
            .ok_or_else(|| invalid_column(Self::TABLE, "priority", &priority_text))?;
        let status_text: String = row.get("status")?;
        let status = RecommendationStatus::parse(&status_text)
            .ok_or_else(|| invalid_column(Self::TABLE, "status", &status_text))?;

        Ok(Self {
            id: parse_uuid(row, Self::TABLE, "uuid")?,
            analysis_id: parse_uuid(row, Self::TABLE, "analysis_uuid")?,
            description: row.get("description")?,
            priority,
            responsible_role: row.get("responsible_role")?,
            status,
            created_date: row.get("created_date")?,
            updated_date: row.get("updated_date")?,
        })
    }

    fn changes(set: &ChangeSet) -> &EntityChanges<Self> {
        &set.recommendations
    }

    fn changes_mut(set: &mut ChangeSet) -> &mut EntityChanges<Self> {
        &mut set.recommendations
    }
}

fn unchanged(kind: EntityKind, field: &'static str, same: bool) -> Result<(), ValidationError> {
    if same {
        Ok(())
    } else {
        Err(ValidationError::new(kind, field, "cannot change after creation"))
    }
}

fn parse_uuid(row: &Row<'_>, table: &str, column: &str) -> DbResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text).map_err(|_| invalid_column(table, column, &text))
}

fn parse_bool(row: &Row<'_>, table: &str, column: &str) -> DbResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(invalid_column(table, column, &other.to_string())),
    }
}

fn invalid_column(table: &str, column: &str, value: &str) -> DbError {
    DbError::InvalidData(format!("invalid value `{value}` in {table}.{column}"))
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn opt_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{insert_sql, remove_sql, update_sql, Entity};
    use crate::model::analysis::{AnalysisResult, IncidentType, Severity};
    use crate::model::recommendation::{Priority, Recommendation, RecommendationStatus};
    use crate::model::report::SafetyReport;
    use std::cmp::Ordering;
    use uuid::Uuid;

    #[test]
    fn generated_sql_binds_every_column() {
        assert_eq!(
            insert_sql::<AnalysisResult>(),
            "INSERT INTO analysis_results (uuid, report_uuid, incident_type, severity, \
             confidence_score, summary, created_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);"
        );
        assert!(update_sql::<AnalysisResult>().ends_with("created_date = ?7 WHERE uuid = ?1;"));
    }

    #[test]
    fn remove_is_soft_for_reports_only() {
        assert_eq!(
            remove_sql::<SafetyReport>(),
            "UPDATE safety_reports SET is_active = 0 WHERE uuid = ?1;"
        );
        assert_eq!(
            remove_sql::<AnalysisResult>(),
            "DELETE FROM analysis_results WHERE uuid = ?1;"
        );
    }

    #[test]
    fn values_align_with_columns() {
        let report = SafetyReport::new("a.pdf", 1, "application/pdf", "ops");
        assert_eq!(report.to_values().len(), SafetyReport::COLUMNS.len());
    }

    #[test]
    fn analysis_fields_are_frozen() {
        let original = AnalysisResult::new(Uuid::new_v4(), IncidentType::Fire, Severity::High, 0.9);
        assert!(original.check_change(&original).is_ok());

        let mut rescored = original.clone();
        rescored.confidence_score = 0.4;
        let err = rescored.check_change(&original).unwrap_err();
        assert_eq!(err.field, "confidence_score");

        let mut moved = original.clone();
        moved.report_id = Uuid::new_v4();
        assert_eq!(moved.check_change(&original).unwrap_err().field, "report_id");
    }

    #[test]
    fn recommendation_only_changes_status() {
        let original =
            Recommendation::new(Uuid::new_v4(), "Fence pit", Priority::High, "Site Manager");

        let mut progressed = original.clone();
        progressed.set_status(RecommendationStatus::InProgress).unwrap();
        assert!(progressed.check_change(&original).is_ok());

        let mut reassigned = original.clone();
        reassigned.responsible_role = "Night Supervisor".to_string();
        assert_eq!(
            reassigned.check_change(&original).unwrap_err().field,
            "responsible_role"
        );

        let mut escalated = original.clone();
        escalated.priority = Priority::Urgent;
        assert_eq!(escalated.check_change(&original).unwrap_err().field, "priority");
    }

    #[test]
    fn default_cmp_matches_sql_order() {
        let analysis = AnalysisResult::new(Uuid::new_v4(), IncidentType::Fire, Severity::High, 0.9);
        let low = Recommendation::new(analysis.id, "Sweep", Priority::Low, "Cleaner");
        let urgent = Recommendation::new(analysis.id, "Evacuate", Priority::Urgent, "Warden");
        assert_eq!(Recommendation::default_cmp(&urgent, &low), Ordering::Less);

        let mut older = SafetyReport::new("a.pdf", 1, "application/pdf", "ops");
        older.uploaded_date = 1_000;
        let mut newer = older.clone();
        newer.id = Uuid::new_v4();
        newer.uploaded_date = 2_000;
        assert_eq!(SafetyReport::default_cmp(&newer, &older), Ordering::Less);
    }
}
