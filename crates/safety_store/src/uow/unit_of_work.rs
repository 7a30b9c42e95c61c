//! Unit of work state machine.
//!
//! # Invariants
//! - States: Idle -> InTransaction -> {Committed | RolledBack}; any -> Disposed.
//! - `begin_transaction` is rejected while a transaction is open.
//! - `commit_transaction`/`rollback_transaction` require an open transaction.
//! - `save_changes` keeps the transaction state unless the engine has ended
//!   the transaction, which moves the unit of work to RolledBack.
//! - A failed COMMIT leaves nothing applied and the state RolledBack.

use super::session::{ChangeSet, PendingChange, Session};
use crate::error::{StoreError, StoreResult};
use crate::repo::{AnalysisResultRepository, RecommendationRepository, SafetyReportRepository};
use log::{error, info, warn};
use rusqlite::{Connection, InterruptHandle};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfWorkState {
    Idle,
    InTransaction,
    Committed,
    RolledBack,
    Disposed,
}

impl UnitOfWorkState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InTransaction => "in_transaction",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Disposed => "disposed",
        }
    }
}

impl Display for UnitOfWorkState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aborts the statement currently running on a unit of work's connection.
///
/// Safe to move to another thread. Cancelling while nothing runs is a no-op.
pub struct CancelHandle {
    inner: InterruptHandle,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.interrupt();
    }
}

/// Session boundary grouping repository operations into one atomic commit.
///
/// Obtained from [`SafetyStore::unit_of_work`](crate::SafetyStore::unit_of_work).
/// Dropping it releases the connection and rolls back an open transaction;
/// [`UnitOfWork::close`] does the same but reports rollback failures.
pub struct UnitOfWork {
    session: Session,
    state: UnitOfWorkState,
    /// Staged set captured at `begin_transaction`, restored on rollback.
    checkpoint: Option<ChangeSet>,
}

impl UnitOfWork {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            session: Session::new(conn),
            state: UnitOfWorkState::Idle,
            checkpoint: None,
        }
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    pub fn safety_reports(&self) -> SafetyReportRepository<'_> {
        SafetyReportRepository::new(&self.session)
    }

    pub fn analysis_results(&self) -> AnalysisResultRepository<'_> {
        AnalysisResultRepository::new(&self.session)
    }

    pub fn recommendations(&self) -> RecommendationRepository<'_> {
        RecommendationRepository::new(&self.session)
    }

    /// Returns the staged write set in flush order.
    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.session.pending_changes()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.session.has_pending()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            inner: self.session.connection().get_interrupt_handle(),
        }
    }

    /// Opens an explicit transaction.
    ///
    /// # Errors
    /// - `InvalidOperation` when a transaction is already open.
    /// - `Storage` when the write lock cannot be acquired within the busy timeout.
    pub fn begin_transaction(&mut self) -> StoreResult<()> {
        if self.state == UnitOfWorkState::InTransaction {
            return Err(self.invalid("begin_transaction"));
        }

        self.session.execute_batch("BEGIN IMMEDIATE;").map_err(|err| {
            error!("event=uow_begin module=uow status=error error={err}");
            err
        })?;
        self.checkpoint = Some(self.session.snapshot());
        self.state = UnitOfWorkState::InTransaction;
        info!("event=uow_begin module=uow status=ok");
        Ok(())
    }

    /// Flushes every staged insert, update and removal as one atomic write.
    ///
    /// Inside an explicit transaction the flush joins it; otherwise it runs
    /// in a transaction of its own. Returns the number of affected rows.
    /// On failure nothing from this flush persists and the staged set is kept.
    ///
    /// # Errors
    /// - `Cancelled` when a [`CancelHandle`] interrupted the flush.
    /// - `TransactionLost` when the explicit transaction was already ended by
    ///   the engine. After this, or after a failure that ended it, the state is
    ///   RolledBack and the staged set is back at its `begin_transaction` value.
    pub fn save_changes(&mut self) -> StoreResult<usize> {
        if !self.session.has_pending() {
            return Ok(0);
        }

        let started_at = Instant::now();
        let staged = self.session.pending_changes().len();
        let result = if self.state == UnitOfWorkState::InTransaction {
            self.session.flush_in_savepoint()
        } else {
            self.session.flush_atomically()
        };

        match result {
            Ok(affected) => {
                self.session.accept_changes();
                info!(
                    "event=uow_save module=uow status=ok state={} staged={} affected={} duration_ms={}",
                    self.state,
                    staged,
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=uow_save module=uow status=error state={} staged={} duration_ms={} error={}",
                    self.state,
                    staged,
                    started_at.elapsed().as_millis(),
                    err
                );
                if self.state == UnitOfWorkState::InTransaction && !self.session.in_transaction() {
                    self.settle_rolled_back("save_changes", "transaction_ended");
                }
                Err(err)
            }
        }
    }

    /// Flushes staged writes and commits the open transaction.
    ///
    /// When the final flush fails the transaction stays open; fix the staged
    /// set and commit again, or roll back. When COMMIT itself fails, e.g. on a
    /// deferred foreign key violation, the transaction is rolled back and the
    /// state becomes RolledBack.
    pub fn commit_transaction(&mut self) -> StoreResult<()> {
        if self.state != UnitOfWorkState::InTransaction {
            return Err(self.invalid("commit_transaction"));
        }
        if !self.session.in_transaction() {
            self.settle_rolled_back("commit_transaction", "transaction_ended");
            return Err(StoreError::TransactionLost);
        }

        let started_at = Instant::now();
        let flushed = self.session.has_pending();
        if flushed {
            if let Err(err) = self.session.flush_in_savepoint() {
                error!("event=uow_commit module=uow status=error stage=flush error={err}");
                if !self.session.in_transaction() {
                    self.settle_rolled_back("commit_transaction", "transaction_ended");
                }
                return Err(err);
            }
        }
        if let Err(err) = self.session.execute_batch("COMMIT;") {
            error!("event=uow_commit module=uow status=error stage=commit error={err}");
            if self.session.in_transaction() {
                if let Err(rollback_err) = self.session.execute_batch("ROLLBACK;") {
                    warn!(
                        "event=uow_rollback module=uow status=error error_code=rollback_failed error={rollback_err}"
                    );
                }
            }
            self.settle_rolled_back("commit_transaction", "commit_failed");
            return Err(err);
        }

        if flushed {
            self.session.accept_changes();
        }
        self.checkpoint = None;
        self.state = UnitOfWorkState::Committed;
        info!(
            "event=uow_commit module=uow status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Discards everything written or staged since `begin_transaction`.
    pub fn rollback_transaction(&mut self) -> StoreResult<()> {
        if self.state != UnitOfWorkState::InTransaction {
            return Err(self.invalid("rollback_transaction"));
        }

        // SQLite may already have rolled back after certain errors.
        if self.session.in_transaction() {
            self.session.execute_batch("ROLLBACK;")?;
        }
        if let Some(checkpoint) = self.checkpoint.take() {
            self.session.restore(checkpoint);
        }
        self.state = UnitOfWorkState::RolledBack;
        info!("event=uow_rollback module=uow status=ok");
        Ok(())
    }

    /// Disposes the unit of work, reporting a failed implicit rollback.
    ///
    /// The connection is released either way.
    pub fn close(mut self) -> StoreResult<()> {
        self.release()
    }

    fn release(&mut self) -> StoreResult<()> {
        if self.state == UnitOfWorkState::Disposed {
            return Ok(());
        }

        let was_open = self.state == UnitOfWorkState::InTransaction;
        let discarded = self.session.pending_changes().len();
        self.state = UnitOfWorkState::Disposed;
        self.checkpoint = None;

        if was_open && self.session.in_transaction() {
            self.session.execute_batch("ROLLBACK;")?;
        }
        info!(
            "event=uow_dispose module=uow status=ok implicit_rollback={} discarded={}",
            was_open, discarded
        );
        Ok(())
    }

    /// Records a transaction that ended without `rollback_transaction`.
    fn settle_rolled_back(&mut self, operation: &'static str, cause: &'static str) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.session.restore(checkpoint);
        }
        self.state = UnitOfWorkState::RolledBack;
        warn!("event=uow_rollback module=uow status=ok cause={cause} operation={operation}");
    }

    fn invalid(&self, operation: &'static str) -> StoreError {
        StoreError::InvalidOperation {
            operation,
            state: self.state,
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        // Closing the connection afterwards discards any transaction the
        // failed rollback left behind.
        if let Err(err) = self.release() {
            warn!("event=uow_dispose module=uow status=error error={err}");
        }
    }
}
