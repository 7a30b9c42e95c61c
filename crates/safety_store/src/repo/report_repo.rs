//! Safety report queries.
//!
//! # Invariants
//! - Listing queries exclude soft-deleted reports; id lookups do not.
//! - Date ranges are inclusive on both bounds.
//! - Text search is a case-insensitive substring match over extracted text.

use super::analysis_repo::AnalysisResultRepository;
use super::generic::{Criteria, Repository};
use crate::error::StoreResult;
use crate::model::analysis::AnalysisResult;
use crate::model::report::{ProcessingStatus, ReportId, SafetyReport};
use crate::uow::session::Session;
use regex::RegexBuilder;
use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::ops::Deref;

/// A report with its analysis eagerly loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWithAnalysis {
    pub report: SafetyReport,
    /// `None` until processing produced an analysis.
    pub analysis: Option<AnalysisResult>,
}

pub struct SafetyReportRepository<'s> {
    base: Repository<'s, SafetyReport>,
}

impl<'s> SafetyReportRepository<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            base: Repository::new(session),
        }
    }

    /// Active reports, most recently uploaded first.
    pub fn get_all_reports(&self) -> StoreResult<Vec<SafetyReport>> {
        self.base.get_all()
    }

    pub fn get_reports_by_status(&self, status: ProcessingStatus) -> StoreResult<Vec<SafetyReport>> {
        self.base.find(Criteria::filter(
            "status = ?",
            vec![Value::Text(status.as_str().to_string())],
            move |report: &SafetyReport| report.status == status,
        ))
    }

    pub fn get_reports_by_user(&self, uploaded_by: &str) -> StoreResult<Vec<SafetyReport>> {
        let user = uploaded_by.to_string();
        self.base.find(Criteria::filter(
            "uploaded_by = ?",
            vec![Value::Text(user.clone())],
            move |report: &SafetyReport| report.uploaded_by == user,
        ))
    }

    /// Reports uploaded within `[start, end]` (epoch milliseconds).
    pub fn get_reports_by_date_range(&self, start: i64, end: i64) -> StoreResult<Vec<SafetyReport>> {
        self.base.find(Criteria::filter(
            "uploaded_date >= ? AND uploaded_date <= ?",
            vec![Value::Integer(start), Value::Integer(end)],
            move |report: &SafetyReport| (start..=end).contains(&report.uploaded_date),
        ))
    }

    /// Reports whose extracted text contains `term`, ignoring case.
    ///
    /// A blank term matches nothing.
    pub fn search_reports(&self, term: &str) -> StoreResult<Vec<SafetyReport>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
            .map_err(|err| crate::db::DbError::InvalidData(err.to_string()))?;

        self.base.find(Criteria::filter(
            "extracted_text IS NOT NULL",
            Vec::new(),
            move |report: &SafetyReport| {
                report
                    .extracted_text
                    .as_deref()
                    .is_some_and(|text| pattern.is_match(text))
            },
        ))
    }

    /// The `count` most recently uploaded active reports, newest first.
    pub fn get_recent_reports(&self, count: u32) -> StoreResult<Vec<SafetyReport>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.base.find(Criteria::all().limit(count))
    }

    /// Looks up one report by id together with its analysis.
    pub fn get_report_with_analysis(&self, id: ReportId) -> StoreResult<Option<ReportWithAnalysis>> {
        let Some(report) = self.base.get_by_id(id)? else {
            return Ok(None);
        };
        let analysis = AnalysisResultRepository::new(self.base.session()).get_by_report_id(report.id)?;
        Ok(Some(ReportWithAnalysis { report, analysis }))
    }

    /// Stored active report count for every status, zeros included.
    ///
    /// Reads committed storage only; staged changes are not counted.
    pub fn count_by_status(&self) -> StoreResult<BTreeMap<ProcessingStatus, u64>> {
        let mut counts: BTreeMap<ProcessingStatus, u64> = ProcessingStatus::ALL
            .into_iter()
            .map(|status| (status, 0))
            .collect();

        let mut stmt = self.base.connection().prepare(
            "SELECT status, COUNT(*) AS total
             FROM safety_reports
             WHERE is_active = 1
             GROUP BY status;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let status_text: String = row.get("status")?;
            let total: i64 = row.get("total")?;
            let status = ProcessingStatus::parse(&status_text).ok_or_else(|| {
                crate::db::DbError::InvalidData(format!(
                    "invalid value `{status_text}` in safety_reports.status"
                ))
            })?;
            counts.insert(status, u64::try_from(total).unwrap_or_default());
        }
        Ok(counts)
    }
}

impl<'s> Deref for SafetyReportRepository<'s> {
    type Target = Repository<'s, SafetyReport>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}
