//! Error taxonomy shared by repositories, the unit of work and the initializer.
//!
//! # Invariants
//! - Validation and not-found conditions stay distinct from storage failures.
//! - Storage and initialization failures carry the underlying cause unchanged.

use crate::config::ConfigError;
use crate::db::DbError;
use crate::logging::LoggingError;
use crate::model::{EntityKind, ValidationError};
use crate::uow::UnitOfWorkState;
use rusqlite::ErrorCode;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} not found in session: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("`{operation}` is not valid while the unit of work is {state}")]
    InvalidOperation {
        operation: &'static str,
        state: UnitOfWorkState,
    },

    #[error("storage error: {0}")]
    Storage(DbError),

    #[error("schema initialization failed during {stage}: {source}")]
    Initialization {
        stage: &'static str,
        #[source]
        source: DbError,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// The engine ended the explicit transaction on its own, e.g. after an
    /// interrupt; its writes are gone.
    #[error("transaction was rolled back by the storage engine")]
    TransactionLost,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl StoreError {
    pub(crate) fn not_found(entity: EntityKind, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub(crate) fn initialization(stage: &'static str, source: DbError) -> Self {
        match source {
            DbError::Sqlite(ref err) if is_interrupt(err) => Self::Cancelled,
            source => Self::Initialization { stage, source },
        }
    }

    /// Returns whether the caller can fix the request and try again without
    /// involving the storage engine.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::InvalidOperation { .. }
        )
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(ref err) if is_interrupt(err) => Self::Cancelled,
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(DbError::Sqlite(value))
    }
}

fn is_interrupt(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
}
