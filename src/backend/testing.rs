//! Scriptable relational session for tests.
//!
//! Behaves like an ORM session over an in-process table set: writes are
//! buffered until `commit`, duplicate primary keys surface as a unique
//! violation at commit time, and negative `LIMIT`/`OFFSET` values are
//! rejected with the same messages PostgreSQL uses. Any operation can be made
//! to fail once with [`FakeSession::fail_next`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{
    BackendError, BackendResult, RelationalSession, Statement, SQLSTATE_INVALID_LIMIT,
    SQLSTATE_INVALID_OFFSET,
};
use crate::entity::{Entity, EntityKey, EntityModel};
use crate::session::store::{store_mut, Storage};

#[derive(Default)]
struct FakeState {
    committed: Storage,
    pending: Option<Storage>,
    violation: Option<BackendError>,
    failures: HashMap<&'static str, BackendError>,
    calls: Vec<&'static str>,
    closed: bool,
}

impl FakeState {
    fn enter(&mut self, op: &'static str) -> BackendResult<()> {
        self.calls.push(op);
        match self.failures.remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn working(&mut self) -> &mut Storage {
        let committed = &self.committed;
        self.pending.get_or_insert_with(|| committed.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeSession {
    state: Mutex<FakeState>,
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session_error(err: crate::error::DatabaseError) -> BackendError {
    BackendError::session(err.to_string())
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `op` fail with `err`.
    pub(crate) fn fail_next(&self, op: &'static str, err: BackendError) {
        self.state.lock().failures.insert(op, err);
    }

    /// Store entities as already committed rows.
    pub(crate) fn seed<T: Entity>(&self, entities: Vec<T>) {
        let mut state = self.state.lock();
        if let Ok(table) = store_mut::<T>(&mut state.committed, EntityModel::of::<T>()) {
            for entity in entities {
                table.insert(entity.key(), entity);
            }
        }
    }

    /// Committed rows of a model, in insertion order.
    pub(crate) fn committed<T: Entity>(&self) -> Vec<T> {
        let mut state = self.state.lock();
        store_mut::<T>(&mut state.committed, EntityModel::of::<T>())
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

fn pkey_for(model: EntityModel) -> String {
    format!("{}_pkey", model.name().to_lowercase())
}

#[async_trait]
impl RelationalSession for FakeSession {
    async fn fetch<T: Entity>(
        &self,
        model: EntityModel,
        key: &EntityKey,
    ) -> BackendResult<Option<T>> {
        let mut state = self.state.lock();
        state.enter("fetch")?;
        let table = store_mut::<T>(state.working(), model).map_err(session_error)?;
        Ok(table.get(key.as_str()).cloned())
    }

    async fn select<T: Entity>(
        &self,
        model: EntityModel,
        limit: Option<i64>,
        offset: i64,
    ) -> BackendResult<Vec<T>> {
        let mut state = self.state.lock();
        state.enter("select")?;
        if limit.is_some_and(|limit| limit < 0) {
            return Err(BackendError::driver("LIMIT must not be negative")
                .with_sqlstate(SQLSTATE_INVALID_LIMIT));
        }
        if offset < 0 {
            return Err(BackendError::driver("OFFSET must not be negative")
                .with_sqlstate(SQLSTATE_INVALID_OFFSET));
        }

        let table = store_mut::<T>(state.working(), model).map_err(session_error)?;
        let take = limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(table
            .values()
            .skip(offset as usize)
            .take(take)
            .cloned()
            .collect())
    }

    async fn add<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<()> {
        self.add_all(model, vec![entity]).await
    }

    async fn add_all<T: Entity>(&self, model: EntityModel, entities: Vec<T>) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter("add")?;
        let mut duplicate = false;
        {
            let table = store_mut::<T>(state.working(), model).map_err(session_error)?;
            for entity in entities {
                let key = entity.key();
                if table.contains_key(key.as_str()) {
                    duplicate = true;
                } else {
                    table.insert(key, entity);
                }
            }
        }
        if duplicate {
            state.violation = Some(BackendError::unique_violation(pkey_for(model)));
        }
        Ok(())
    }

    async fn merge<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<T> {
        let mut state = self.state.lock();
        state.enter("merge")?;
        let table = store_mut::<T>(state.working(), model).map_err(session_error)?;
        table.insert(entity.key(), entity.clone());
        Ok(entity)
    }

    async fn delete<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter("delete")?;
        let table = store_mut::<T>(state.working(), model).map_err(session_error)?;
        table.remove(entity.key().as_str());
        Ok(())
    }

    async fn execute(&self, statement: Statement) -> BackendResult<u64> {
        let mut state = self.state.lock();
        state.enter("execute")?;
        match statement {
            Statement::DeleteAll(model) => {
                let removed = match state.working().get_mut(&model) {
                    Some(table) => {
                        let removed = table.len() as u64;
                        table.clear();
                        removed
                    }
                    None => 0,
                };
                Ok(removed)
            }
            Statement::Raw(_) => Ok(0),
        }
    }

    async fn commit(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter("commit")?;
        if let Some(violation) = state.violation.take() {
            return Err(violation);
        }
        if let Some(pending) = state.pending.take() {
            state.committed = pending;
        }
        Ok(())
    }

    async fn rollback(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter("rollback")?;
        state.pending = None;
        state.violation = None;
        Ok(())
    }

    async fn close(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        state.enter("close")?;
        state.pending = None;
        state.violation = None;
        state.closed = true;
        Ok(())
    }
}
