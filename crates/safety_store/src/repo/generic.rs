//! Generic CRUD and query primitive over one record type.

use super::entity::{select_sql, Entity};
use crate::error::StoreResult;
use crate::uow::session::{Session, StagedView};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::cmp::Ordering;
use std::marker::PhantomData;
use uuid::Uuid;

type Matcher<T> = Box<dyn Fn(&T) -> bool>;
type Comparator<T> = fn(&T, &T) -> Ordering;

/// Predicate, ordering and limit for a query.
///
/// The SQL clause selects stored rows and may select a superset; `matches`
/// decides membership in memory. The comparator mirrors the SQL order and is
/// used once staged records are merged into a result.
pub(crate) struct Criteria<T> {
    filter: Option<String>,
    values: Vec<Value>,
    matches: Option<Matcher<T>>,
    order: Option<(&'static str, Comparator<T>)>,
    limit: Option<u32>,
    include_inactive: bool,
}

impl<T: Entity> Criteria<T> {
    pub(crate) fn all() -> Self {
        Self {
            filter: None,
            values: Vec::new(),
            matches: None,
            order: None,
            limit: None,
            include_inactive: false,
        }
    }

    /// `clause` uses anonymous `?` placeholders bound from `values` in order;
    /// `matches` must reject every record `clause` rejects.
    pub(crate) fn filter(
        clause: impl Into<String>,
        values: Vec<Value>,
        matches: impl Fn(&T) -> bool + 'static,
    ) -> Self {
        Self {
            filter: Some(clause.into()),
            values,
            matches: Some(Box::new(matches)),
            ..Self::all()
        }
    }

    pub(crate) fn order_by(mut self, order_by: &'static str, cmp: Comparator<T>) -> Self {
        self.order = Some((order_by, cmp));
        self
    }

    pub(crate) fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, entity: &T) -> bool {
        self.matches.as_ref().map_or(true, |matches| matches(entity))
    }

    fn compare(&self, left: &T, right: &T) -> Ordering {
        match self.order {
            Some((_, cmp)) => cmp(left, right),
            None => T::default_cmp(left, right),
        }
    }

    fn to_sql(&self, with_limit: bool) -> String {
        let mut sql = format!("{} WHERE ", select_sql::<T>());
        sql.push_str(self.filter.as_deref().unwrap_or("1 = 1"));
        if let (Some(column), false) = (T::ACTIVE_COLUMN, self.include_inactive) {
            sql.push_str(&format!(" AND {column} = 1"));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(self.order.map_or(T::DEFAULT_ORDER, |(order_by, _)| order_by));
        if with_limit {
            sql.push_str(" LIMIT ?");
        }
        sql
    }
}

/// Collection-like facade over one record type, bound to a session.
pub struct Repository<'s, T: Entity> {
    session: &'s Session,
    _entity: PhantomData<T>,
}

impl<'s, T: Entity> Repository<'s, T> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    /// Stages an insert and returns the record id.
    ///
    /// # Errors
    /// - `Validation` when required fields are unset or the id is already
    ///   tracked in this session.
    pub fn add(&self, entity: T) -> StoreResult<Uuid> {
        let id = entity.id();
        self.session.stage_insert(entity)?;
        Ok(id)
    }

    /// Returns the record with `id`, including this session's staged state.
    ///
    /// Soft-deleted records are returned with their inactive flag set.
    pub fn get_by_id(&self, id: Uuid) -> StoreResult<Option<T>> {
        let view = self.session.view::<T>(id);
        let removed = match view {
            StagedView::Present(entity) => return Ok(Some(entity)),
            StagedView::Removed if T::ACTIVE_COLUMN.is_none() => return Ok(None),
            StagedView::Removed => true,
            StagedView::Untouched => false,
        };

        let mut criteria = Criteria::filter(
            "uuid = ?",
            vec![Value::Text(id.to_string())],
            move |entity: &T| entity.id() == id,
        );
        criteria.include_inactive = true;
        let Some(mut entity) = self.load(&criteria, None)?.into_iter().next() else {
            return Ok(None);
        };
        self.session.track(&entity);
        if removed {
            entity.mark_removed();
        }
        Ok(Some(entity))
    }

    /// Returns every active record in default order.
    ///
    /// Each call re-reads storage; records staged for insert are not included
    /// until saved.
    pub fn get_all(&self) -> StoreResult<Vec<T>> {
        self.find(Criteria::all())
    }

    /// Stages an update of a record loaded or added in this session.
    ///
    /// # Errors
    /// - `NotFound` when the record was never attached to this session.
    /// - `Validation` for invalid fields or an illegal status change.
    pub fn update(&self, entity: T) -> StoreResult<()> {
        self.session.stage_update(entity)
    }

    /// Stages removal; soft for reports, hard otherwise. Idempotent.
    pub fn remove(&self, entity: &T) -> StoreResult<()> {
        self.remove_by_id(entity.id())
    }

    pub fn remove_by_id(&self, id: Uuid) -> StoreResult<()> {
        self.session.stage_remove::<T>(id);
        Ok(())
    }

    /// Number of stored active records.
    pub fn count(&self) -> StoreResult<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        if let Some(column) = T::ACTIVE_COLUMN {
            sql.push_str(&format!(" WHERE {column} = 1"));
        }
        let count: i64 = self.connection().query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn exists(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.get_by_id(id)?.is_some())
    }

    /// Runs `criteria` against storage overlaid with this session's staged
    /// updates and removals.
    ///
    /// A staged update is returned exactly when its staged value satisfies
    /// the criteria. Staged inserts are not included until saved.
    pub(crate) fn find(&self, criteria: Criteria<T>) -> StoreResult<Vec<T>> {
        if !self.session.has_staged::<T>() {
            let loaded = self.load(&criteria, criteria.limit)?;
            let mut found = self.session.reconcile(loaded, criteria.include_inactive);
            found.retain(|entity| criteria.matches(entity));
            return Ok(found);
        }

        let loaded = self.load(&criteria, None)?;
        let mut found = self.session.reconcile(loaded, criteria.include_inactive);
        for staged in self.session.staged_updates::<T>() {
            let listed = found.iter().any(|entity| entity.id() == staged.id());
            if !listed && (criteria.include_inactive || staged.is_active()) {
                found.push(staged);
            }
        }
        found.retain(|entity| criteria.matches(entity));
        found.sort_by(|left, right| criteria.compare(left, right));
        if let Some(limit) = criteria.limit {
            found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(found)
    }

    pub(crate) fn session(&self) -> &'s Session {
        self.session
    }

    pub(crate) fn connection(&self) -> &'s Connection {
        self.session.connection()
    }

    fn load(&self, criteria: &Criteria<T>, limit: Option<u32>) -> StoreResult<Vec<T>> {
        let mut values = criteria.values.clone();
        if let Some(limit) = limit {
            values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.connection().prepare(&criteria.to_sql(limit.is_some()))?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(T::from_row(row)?);
        }
        Ok(entities)
    }
}
