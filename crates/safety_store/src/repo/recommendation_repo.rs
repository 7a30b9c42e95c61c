//! Recommendation queries; results are ordered most urgent first.

use super::generic::{Criteria, Repository};
use crate::error::StoreResult;
use crate::model::analysis::AnalysisId;
use crate::model::recommendation::{Priority, Recommendation, RecommendationStatus};
use crate::uow::session::Session;
use rusqlite::types::Value;
use std::ops::Deref;

pub struct RecommendationRepository<'s> {
    base: Repository<'s, Recommendation>,
}

impl<'s> RecommendationRepository<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            base: Repository::new(session),
        }
    }

    pub fn get_by_status(&self, status: RecommendationStatus) -> StoreResult<Vec<Recommendation>> {
        self.base.find(Criteria::filter(
            "status = ?",
            vec![Value::Text(status.as_str().to_string())],
            move |recommendation: &Recommendation| recommendation.status == status,
        ))
    }

    pub fn get_by_priority(&self, priority: Priority) -> StoreResult<Vec<Recommendation>> {
        self.base.find(Criteria::filter(
            "priority = ?",
            vec![Value::Text(priority.as_str().to_string())],
            move |recommendation: &Recommendation| recommendation.priority == priority,
        ))
    }

    /// Matches the role ignoring ASCII case.
    pub fn get_by_responsible_role(&self, role: &str) -> StoreResult<Vec<Recommendation>> {
        let role = role.trim().to_string();
        self.base.find(Criteria::filter(
            "responsible_role = ? COLLATE NOCASE",
            vec![Value::Text(role.clone())],
            move |recommendation: &Recommendation| {
                recommendation.responsible_role.eq_ignore_ascii_case(&role)
            },
        ))
    }

    pub fn get_pending_recommendations(&self) -> StoreResult<Vec<Recommendation>> {
        self.get_by_status(RecommendationStatus::Pending)
    }

    pub fn get_recommendations_by_analysis_id(
        &self,
        analysis_id: AnalysisId,
    ) -> StoreResult<Vec<Recommendation>> {
        self.base.find(Criteria::filter(
            "analysis_uuid = ?",
            vec![Value::Text(analysis_id.to_string())],
            move |recommendation: &Recommendation| recommendation.analysis_id == analysis_id,
        ))
    }
}

impl<'s> Deref for RecommendationRepository<'s> {
    type Target = Repository<'s, Recommendation>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
