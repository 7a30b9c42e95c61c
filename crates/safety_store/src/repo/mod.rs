//! Repository layer over the unit-of-work session.
//!
//! # Responsibility
//! - Provide collection-like CRUD over one record type (`Repository<T>`).
//! - Layer record-specific queries on top by composition.
//!
//! # Invariants
//! - Mutations only stage changes; they reach storage on `save_changes`.
//! - Lookup by id sees this session's staged state; predicate queries read
//!   stored rows and overlay staged updates and removals on them.
//! - Empty query results are valid, never errors.

pub mod analysis_repo;
pub mod entity;
mod generic;
pub mod recommendation_repo;
pub mod report_repo;

pub use analysis_repo::{AnalysisResultRepository, AnalysisWithRecommendations};
pub use entity::Entity;
pub use generic::Repository;
pub use recommendation_repo::RecommendationRepository;
pub use report_repo::{ReportWithAnalysis, SafetyReportRepository};
