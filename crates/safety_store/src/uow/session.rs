//! Session state shared by the repositories of one unit of work.
//!
//! # Responsibility
//! - Own the connection and the explicit staged write set.
//! - Track records loaded or added in this session.
//! - Flush staged operations atomically.
//!
//! # Invariants
//! - Staged operations are kept per record in staging order, one op per id.
//! - Nothing staged reaches the database outside `flush`.
//! - A failed flush leaves the staged set untouched for inspection or retry.
//! - A savepoint flush never runs in autocommit mode.

use crate::error::{StoreError, StoreResult};
use crate::model::analysis::AnalysisResult;
use crate::model::recommendation::Recommendation;
use crate::model::report::SafetyReport;
use crate::model::{EntityKind, ValidationError};
use crate::repo::entity::{insert_sql, remove_sql, update_sql, Entity};
use log::warn;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of write recorded for a staged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Update,
    Remove,
}

/// One entry of the staged write set, as reported by
/// [`UnitOfWork::pending_changes`](super::UnitOfWork::pending_changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    pub entity: EntityKind,
    pub id: Uuid,
    pub operation: ChangeOperation,
}

#[derive(Debug, Clone)]
pub enum StagedOp<T> {
    Insert(T),
    Update(T),
    Remove,
}

#[derive(Debug, Clone)]
pub struct Staged<T> {
    id: Uuid,
    op: StagedOp<T>,
}

/// Staged view of one record id.
pub(crate) enum StagedView<T> {
    Untouched,
    Present(T),
    Removed,
}

/// Tracked and staged state for one record type.
#[derive(Debug, Clone)]
pub struct EntityChanges<T> {
    /// Last value known to be persisted, keyed by id.
    tracked: HashMap<Uuid, T>,
    staged: Vec<Staged<T>>,
}

impl<T> Default for EntityChanges<T> {
    fn default() -> Self {
        Self {
            tracked: HashMap::new(),
            staged: Vec::new(),
        }
    }
}

impl<T: Entity> EntityChanges<T> {
    fn position(&self, id: Uuid) -> Option<usize> {
        self.staged.iter().position(|staged| staged.id == id)
    }

    fn stage_insert(&mut self, entity: T) -> StoreResult<()> {
        entity.validate_entity()?;
        let id = entity.id();
        if self.position(id).is_some() || self.tracked.contains_key(&id) {
            return Err(ValidationError::new(
                T::KIND,
                "id",
                format!("{id} is already tracked in this session"),
            )
            .into());
        }
        self.staged.push(Staged {
            id,
            op: StagedOp::Insert(entity),
        });
        Ok(())
    }

    fn stage_update(&mut self, entity: T) -> StoreResult<()> {
        entity.validate_entity()?;
        let id = entity.id();
        match self.position(id) {
            Some(index) => match &mut self.staged[index].op {
                StagedOp::Insert(previous) | StagedOp::Update(previous) => {
                    entity.check_change(previous)?;
                    *previous = entity;
                    Ok(())
                }
                StagedOp::Remove => Err(StoreError::not_found(T::KIND, id)),
            },
            None => {
                let previous = self
                    .tracked
                    .get(&id)
                    .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
                entity.check_change(previous)?;
                self.staged.push(Staged {
                    id,
                    op: StagedOp::Update(entity),
                });
                Ok(())
            }
        }
    }

    fn stage_remove(&mut self, id: Uuid) {
        let Some(index) = self.position(id) else {
            self.staged.push(Staged {
                id,
                op: StagedOp::Remove,
            });
            return;
        };

        if T::ACTIVE_COLUMN.is_some() {
            if let StagedOp::Insert(entity) | StagedOp::Update(entity) = &mut self.staged[index].op {
                entity.mark_removed();
            }
            return;
        }

        match self.staged[index].op {
            StagedOp::Insert(_) => {
                self.staged.remove(index);
            }
            StagedOp::Update(_) => self.staged[index].op = StagedOp::Remove,
            StagedOp::Remove => {}
        }
    }

    fn view(&self, id: Uuid) -> StagedView<T> {
        match self.position(id).map(|index| &self.staged[index].op) {
            Some(StagedOp::Insert(entity)) | Some(StagedOp::Update(entity)) => {
                StagedView::Present(entity.clone())
            }
            Some(StagedOp::Remove) => StagedView::Removed,
            None => StagedView::Untouched,
        }
    }

    fn track(&mut self, entity: &T) {
        self.tracked.insert(entity.id(), entity.clone());
    }

    fn updates(&self) -> Vec<T> {
        self.staged
            .iter()
            .filter_map(|staged| match &staged.op {
                StagedOp::Update(entity) => Some(entity.clone()),
                _ => None,
            })
            .collect()
    }

    fn removed_ids(&self) -> Vec<Uuid> {
        self.staged
            .iter()
            .filter(|staged| matches!(staged.op, StagedOp::Remove))
            .map(|staged| staged.id)
            .collect()
    }

    /// Stops tracking records matching `detached`.
    fn untrack_where(&mut self, detached: impl Fn(&T) -> bool) {
        self.tracked.retain(|_, entity| !detached(entity));
    }

    fn pending(&self) -> impl Iterator<Item = PendingChange> + '_ {
        self.staged.iter().map(|staged| PendingChange {
            entity: T::KIND,
            id: staged.id,
            operation: match staged.op {
                StagedOp::Insert(_) => ChangeOperation::Insert,
                StagedOp::Update(_) => ChangeOperation::Update,
                StagedOp::Remove => ChangeOperation::Remove,
            },
        })
    }

    fn flush_writes(&self, conn: &Connection) -> StoreResult<usize> {
        let mut affected = 0;
        for staged in &self.staged {
            match &staged.op {
                StagedOp::Insert(entity) => {
                    affected += conn.execute(&insert_sql::<T>(), params_from_iter(entity.to_values()))?;
                }
                StagedOp::Update(entity) => {
                    let changed =
                        conn.execute(&update_sql::<T>(), params_from_iter(entity.to_values()))?;
                    if changed == 0 {
                        return Err(StoreError::not_found(T::KIND, staged.id));
                    }
                    affected += changed;
                }
                StagedOp::Remove => {}
            }
        }
        Ok(affected)
    }

    fn flush_removes(&self, conn: &Connection) -> StoreResult<usize> {
        let mut affected = 0;
        for staged in &self.staged {
            if let StagedOp::Remove = staged.op {
                affected += conn.execute(&remove_sql::<T>(), [staged.id.to_string()])?;
            }
        }
        Ok(affected)
    }

    /// Folds flushed operations into the tracked state and clears the stage.
    fn accept(&mut self) {
        for staged in std::mem::take(&mut self.staged) {
            match staged.op {
                StagedOp::Insert(entity) | StagedOp::Update(entity) => {
                    self.tracked.insert(staged.id, entity);
                }
                StagedOp::Remove if T::ACTIVE_COLUMN.is_some() => {
                    if let Some(entity) = self.tracked.get_mut(&staged.id) {
                        entity.mark_removed();
                    }
                }
                StagedOp::Remove => {
                    self.tracked.remove(&staged.id);
                }
            }
        }
    }
}

/// Staged and tracked state for every record type of one session.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub(crate) reports: EntityChanges<SafetyReport>,
    pub(crate) analyses: EntityChanges<AnalysisResult>,
    pub(crate) recommendations: EntityChanges<Recommendation>,
}

impl ChangeSet {
    fn is_empty(&self) -> bool {
        self.reports.staged.is_empty()
            && self.analyses.staged.is_empty()
            && self.recommendations.staged.is_empty()
    }
}

pub(crate) struct Session {
    conn: Connection,
    changes: RefCell<ChangeSet>,
}

impl Session {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            conn,
            changes: RefCell::new(ChangeSet::default()),
        }
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub(crate) fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub(crate) fn stage_insert<T: Entity>(&self, entity: T) -> StoreResult<()> {
        T::changes_mut(&mut self.changes.borrow_mut()).stage_insert(entity)
    }

    pub(crate) fn stage_update<T: Entity>(&self, entity: T) -> StoreResult<()> {
        T::changes_mut(&mut self.changes.borrow_mut()).stage_update(entity)
    }

    pub(crate) fn stage_remove<T: Entity>(&self, id: Uuid) {
        T::changes_mut(&mut self.changes.borrow_mut()).stage_remove(id);
    }

    pub(crate) fn view<T: Entity>(&self, id: Uuid) -> StagedView<T> {
        T::changes(&self.changes.borrow()).view(id)
    }

    pub(crate) fn track<T: Entity>(&self, entity: &T) {
        T::changes_mut(&mut self.changes.borrow_mut()).track(entity);
    }

    pub(crate) fn has_staged<T: Entity>(&self) -> bool {
        !T::changes(&self.changes.borrow()).staged.is_empty()
    }

    /// Staged values of records already persisted.
    pub(crate) fn staged_updates<T: Entity>(&self) -> Vec<T> {
        T::changes(&self.changes.borrow()).updates()
    }

    /// Tracks loaded rows and overlays this session's staged state on them.
    ///
    /// Rows staged for removal, and inactive rows unless `include_inactive`,
    /// are dropped.
    pub(crate) fn reconcile<T: Entity>(&self, loaded: Vec<T>, include_inactive: bool) -> Vec<T> {
        let mut changes = self.changes.borrow_mut();
        let entity_changes = T::changes_mut(&mut changes);
        loaded
            .into_iter()
            .filter_map(|row| {
                entity_changes.track(&row);
                let entity = match entity_changes.view(row.id()) {
                    StagedView::Untouched => row,
                    StagedView::Present(staged) => staged,
                    StagedView::Removed if include_inactive && T::ACTIVE_COLUMN.is_some() => {
                        let mut removed = row;
                        removed.mark_removed();
                        removed
                    }
                    StagedView::Removed => return None,
                };
                (include_inactive || entity.is_active()).then_some(entity)
            })
            .collect()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.changes.borrow().is_empty()
    }

    pub(crate) fn pending_changes(&self) -> Vec<PendingChange> {
        let changes = self.changes.borrow();
        changes
            .reports
            .pending()
            .chain(changes.analyses.pending())
            .chain(changes.recommendations.pending())
            .collect()
    }

    pub(crate) fn snapshot(&self) -> ChangeSet {
        self.changes.borrow().clone()
    }

    pub(crate) fn restore(&self, snapshot: ChangeSet) {
        *self.changes.borrow_mut() = snapshot;
    }

    /// Folds a successful flush into the tracked state.
    ///
    /// Recommendations of a deleted analysis were removed by the cascade and
    /// are no longer tracked.
    pub(crate) fn accept_changes(&self) {
        let mut changes = self.changes.borrow_mut();
        let deleted_analyses = changes.analyses.removed_ids();
        changes.reports.accept();
        changes.analyses.accept();
        changes.recommendations.accept();
        if !deleted_analyses.is_empty() {
            changes
                .recommendations
                .untrack_where(|recommendation| deleted_analyses.contains(&recommendation.analysis_id));
        }
    }

    /// Flushes the staged set inside its own `IMMEDIATE` transaction.
    pub(crate) fn flush_atomically(&self) -> StoreResult<usize> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        let result = self
            .flush()
            .and_then(|affected| self.execute_batch("COMMIT;").map(|()| affected));
        if result.is_err() && self.in_transaction() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                warn!("event=uow_save module=uow status=error error_code=rollback_failed error={err}");
            }
        }
        result
    }

    /// Flushes the staged set inside a savepoint of the open transaction.
    ///
    /// # Errors
    /// - `TransactionLost` when no transaction is open on the connection; a
    ///   savepoint there would commit like a plain transaction.
    pub(crate) fn flush_in_savepoint(&self) -> StoreResult<usize> {
        if !self.in_transaction() {
            return Err(StoreError::TransactionLost);
        }
        self.conn.execute_batch("SAVEPOINT save_changes;")?;
        let result = self
            .flush()
            .and_then(|affected| self.execute_batch("RELEASE save_changes;").map(|()| affected));
        match result {
            Ok(affected) => Ok(affected),
            Err(err) if !self.in_transaction() => Err(err),
            Err(err) => {
                if let Err(rollback_err) = self
                    .conn
                    .execute_batch("ROLLBACK TO save_changes; RELEASE save_changes;")
                {
                    warn!(
                        "event=uow_save module=uow status=error error_code=savepoint_rollback_failed error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }

    /// Executes every staged operation; the caller owns transaction control.
    ///
    /// Foreign keys are checked at commit, so staging order across record
    /// types does not matter.
    fn flush(&self) -> StoreResult<usize> {
        self.conn.execute_batch("PRAGMA defer_foreign_keys = ON;")?;
        let changes = self.changes.borrow();
        let mut affected = 0;
        affected += changes.reports.flush_writes(&self.conn)?;
        affected += changes.analyses.flush_writes(&self.conn)?;
        affected += changes.recommendations.flush_writes(&self.conn)?;
        affected += changes.recommendations.flush_removes(&self.conn)?;
        affected += changes.analyses.flush_removes(&self.conn)?;
        affected += changes.reports.flush_removes(&self.conn)?;
        Ok(affected)
    }
}
