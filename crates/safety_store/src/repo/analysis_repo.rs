//! Analysis result queries.
//!
//! # Invariants
//! - The critical-incident predicate is built from the same constants as
//!   `AnalysisResult::is_critical`.
//! - Low confidence means strictly below the threshold.

use super::generic::{Criteria, Repository};
use super::recommendation_repo::RecommendationRepository;
use crate::error::StoreResult;
use crate::model::analysis::{
    AnalysisId, AnalysisResult, IncidentType, Severity, CRITICAL_INCIDENT_TYPES,
};
use crate::model::recommendation::Recommendation;
use crate::model::report::ReportId;
use crate::uow::session::Session;
use rusqlite::types::Value;
use std::ops::Deref;

/// An analysis with its recommendations eagerly loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWithRecommendations {
    pub analysis: AnalysisResult,
    pub recommendations: Vec<Recommendation>,
}

pub struct AnalysisResultRepository<'s> {
    base: Repository<'s, AnalysisResult>,
}

impl<'s> AnalysisResultRepository<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            base: Repository::new(session),
        }
    }

    pub fn get_by_incident_type(&self, incident_type: IncidentType) -> StoreResult<Vec<AnalysisResult>> {
        self.base.find(Criteria::filter(
            "incident_type = ?",
            vec![Value::Text(incident_type.as_str().to_string())],
            move |analysis: &AnalysisResult| analysis.incident_type == incident_type,
        ))
    }

    pub fn get_by_severity(&self, severity: Severity) -> StoreResult<Vec<AnalysisResult>> {
        self.base.find(Criteria::filter(
            "severity = ?",
            vec![Value::Text(severity.as_str().to_string())],
            move |analysis: &AnalysisResult| analysis.severity == severity,
        ))
    }

    /// Analyses with `confidence_score < threshold`, flagged for human review.
    pub fn get_analysis_with_low_confidence(&self, threshold: f64) -> StoreResult<Vec<AnalysisResult>> {
        self.base.find(
            Criteria::filter(
                "confidence_score < ?",
                vec![Value::Real(threshold)],
                move |analysis: &AnalysisResult| analysis.is_low_confidence(threshold),
            )
            .order_by("confidence_score ASC, uuid ASC", |left, right| {
                left.confidence_score
                    .total_cmp(&right.confidence_score)
                    .then_with(|| left.id.cmp(&right.id))
            }),
        )
    }

    /// Analyses created within `[start, end]` (epoch milliseconds).
    pub fn get_by_date_range(&self, start: i64, end: i64) -> StoreResult<Vec<AnalysisResult>> {
        self.base.find(Criteria::filter(
            "created_date >= ? AND created_date <= ?",
            vec![Value::Integer(start), Value::Integer(end)],
            move |analysis: &AnalysisResult| (start..=end).contains(&analysis.created_date),
        ))
    }

    /// Looks up one analysis by id together with its recommendations.
    pub fn get_analysis_with_recommendations(
        &self,
        id: AnalysisId,
    ) -> StoreResult<Option<AnalysisWithRecommendations>> {
        let Some(analysis) = self.base.get_by_id(id)? else {
            return Ok(None);
        };
        let recommendations = RecommendationRepository::new(self.base.session())
            .get_recommendations_by_analysis_id(analysis.id)?;
        Ok(Some(AnalysisWithRecommendations {
            analysis,
            recommendations,
        }))
    }

    /// Analyses matching the critical-incident policy of
    /// [`AnalysisResult::is_critical`].
    pub fn get_critical_incidents(&self) -> StoreResult<Vec<AnalysisResult>> {
        let placeholders = vec!["?"; CRITICAL_INCIDENT_TYPES.len()].join(", ");
        let mut values = vec![Value::Text(Severity::HIGHEST.as_str().to_string())];
        values.extend(
            CRITICAL_INCIDENT_TYPES
                .iter()
                .map(|kind| Value::Text(kind.as_str().to_string())),
        );
        self.base.find(Criteria::filter(
            format!("(severity = ? OR incident_type IN ({placeholders}))"),
            values,
            AnalysisResult::is_critical,
        ))
    }

    pub fn get_by_report_id(&self, report_id: ReportId) -> StoreResult<Option<AnalysisResult>> {
        let found = self.base.find(
            Criteria::filter(
                "report_uuid = ?",
                vec![Value::Text(report_id.to_string())],
                move |analysis: &AnalysisResult| analysis.report_id == report_id,
            )
            .limit(1),
        )?;
        Ok(found.into_iter().next())
    }
}

impl<'s> Deref for AnalysisResultRepository<'s> {
    type Target = Repository<'s, AnalysisResult>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
