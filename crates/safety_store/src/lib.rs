//! Persistence core for safety-incident reports, their analyses and
//! recommendations.
//! This crate is the single source of truth for storage invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod seed;
mod store;
pub mod uow;

pub use config::{DatabaseLocation, InitProfile, StoreConfig};
pub use db::{Database, SchemaInitializer};
pub use error::{StoreError, StoreResult};
pub use logging::{
    default_log_level, flush_logs, init_logging, logging_status, LogSettings, LoggingError,
};
pub use model::analysis::{AnalysisId, AnalysisResult, IncidentType, Severity};
pub use model::recommendation::{
    Priority, Recommendation, RecommendationId, RecommendationStatus,
};
pub use model::report::{ProcessingStatus, ReportId, SafetyReport};
pub use model::{EntityKind, ValidationError};
pub use repo::{
    AnalysisResultRepository, AnalysisWithRecommendations, RecommendationRepository, Repository,
    ReportWithAnalysis, SafetyReportRepository,
};
pub use seed::SeedSummary;
pub use store::SafetyStore;
pub use uow::{CancelHandle, ChangeOperation, PendingChange, UnitOfWork, UnitOfWorkState};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
