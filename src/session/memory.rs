//! In-memory session with snapshot-and-replace transactions.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use ulid::Ulid;

use crate::entity::{Entity, EntityModel};
use crate::error::{DatabaseError, DatabaseResult};
use crate::session::guard::SessionGuard;
use crate::session::store::{entity_count, store_mut, Storage, StorageMap};

/// Metadata of the open transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    /// Unique transaction ID.
    pub id: Ulid,
    /// When the transaction started.
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionState {
    /// Durable data, visible outside any transaction.
    committed: Storage,
    /// Working copy while a transaction is open.
    staging: Storage,
    /// `Some` while a transaction is open.
    transaction: Option<TransactionInfo>,
}

/// Owns committed and staged storage for every entity model.
///
/// With no open transaction, reads and writes go straight to committed
/// storage (auto-commit). After [`begin`](Self::begin) they go to a staging
/// area seeded with a deep copy of committed storage; [`commit`](Self::commit)
/// replaces committed storage with the staging area across all models at
/// once and [`rollback`](Self::rollback) discards it.
///
/// Clones share the same storage, which is how repositories of one unit of
/// work see each other's writes. Distinct sessions are fully isolated.
///
/// Entities are stored by value: writes store owned clones and reads return
/// clones, so a caller's value and the stored value never alias.
#[derive(Clone, Default)]
pub struct InMemorySession {
    inner: Arc<Mutex<SessionState>>,
}

impl InMemorySession {
    /// Create a session with empty storage and no open transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.inner.lock().transaction.is_some()
    }

    /// Metadata of the open transaction, if any.
    pub fn transaction_info(&self) -> Option<TransactionInfo> {
        self.inner.lock().transaction.clone()
    }

    /// Start a transaction by snapshotting every model's committed storage.
    ///
    /// Fails with [`DatabaseError::TransactionAlreadyActive`] when a
    /// transaction is already open; the open transaction is left untouched.
    pub async fn begin(&self) -> DatabaseResult<()> {
        self.begin_now().map(|_| ())
    }

    /// Start a transaction that rolls back when the returned guard drops
    /// without having been committed.
    pub fn begin_guarded(&self) -> DatabaseResult<SessionGuard> {
        let info = self.begin_now()?;
        Ok(SessionGuard::new(self.clone(), info.id))
    }

    /// Apply staged changes of every model at once.
    ///
    /// Committed storage is replaced wholesale by the staging area, not
    /// merged with it. No-op when no transaction is open.
    pub async fn commit(&self) {
        self.commit_now();
    }

    /// Discard staged changes. No-op when no transaction is open.
    ///
    /// Writes made to committed storage directly while the transaction was
    /// open are not undone.
    pub async fn rollback(&self) {
        self.rollback_now();
    }

    /// Roll back any open transaction. Always safe to call.
    pub async fn close(&self) {
        if self.rollback_now() {
            debug!("session closed with an open transaction; rolled back");
        }
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`, and
    /// closes the session in both cases. If the returned future is dropped
    /// before completing, the transaction is rolled back.
    pub async fn transaction<F, Fut, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(InMemorySession) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<DatabaseError>,
    {
        let guard = self.begin_guarded()?;

        let result = f(self.clone()).await;
        match &result {
            Ok(_) => guard.commit().await,
            Err(_) => guard.rollback().await,
        }
        self.close().await;

        result
    }

    /// Run `f` on the map reads and writes should target for `model`.
    ///
    /// That is the staging map inside a transaction and the committed map
    /// otherwise; either is created empty on first reference.
    pub fn with_active_storage<T, R, F>(&self, model: EntityModel, f: F) -> DatabaseResult<R>
    where
        T: Entity,
        F: FnOnce(&mut StorageMap<T>) -> R,
    {
        let mut state = self.inner.lock();
        let state = &mut *state;
        let storage = if state.transaction.is_some() {
            &mut state.staging
        } else {
            &mut state.committed
        };
        Ok(f(store_mut::<T>(storage, model)?))
    }

    /// Run `f` on the committed map for `model`, whatever the transaction
    /// state, creating it empty on first reference.
    ///
    /// Meant for verification and out-of-band access. Writes made here while
    /// a transaction is open survive its rollback and are overwritten by its
    /// commit.
    pub fn with_committed_storage<T, R, F>(&self, model: EntityModel, f: F) -> DatabaseResult<R>
    where
        T: Entity,
        F: FnOnce(&mut StorageMap<T>) -> R,
    {
        let mut state = self.inner.lock();
        Ok(f(store_mut::<T>(&mut state.committed, model)?))
    }

    /// Clone of the committed entities of `model`, in insertion order.
    pub fn committed_entities<T: Entity>(&self, model: EntityModel) -> DatabaseResult<Vec<T>> {
        self.with_committed_storage(model, |map: &mut StorageMap<T>| {
            map.values().cloned().collect()
        })
    }

    pub(crate) fn begin_now(&self) -> DatabaseResult<TransactionInfo> {
        let mut state = self.inner.lock();
        if let Some(open) = &state.transaction {
            return Err(DatabaseError::TransactionAlreadyActive {
                transaction_id: open.id.to_string(),
            });
        }

        let info = TransactionInfo {
            id: Ulid::new(),
            started_at: Utc::now(),
        };
        state.staging = state.committed.clone();
        state.transaction = Some(info.clone());

        debug!(
            transaction = %info.id,
            models = state.staging.len(),
            entities = entity_count(&state.staging),
            "transaction started"
        );
        Ok(info)
    }

    /// Returns whether a transaction was open.
    pub(crate) fn commit_now(&self) -> bool {
        self.inner.lock().commit()
    }

    /// Returns whether a transaction was open.
    pub(crate) fn rollback_now(&self) -> bool {
        self.inner.lock().rollback()
    }

    /// Roll back only if `id` is still the open transaction.
    pub(crate) fn rollback_if_current(&self, id: Ulid) -> bool {
        let mut state = self.inner.lock();
        state.is_current(id) && state.rollback()
    }

    /// Commit only if `id` is still the open transaction.
    pub(crate) fn commit_if_current(&self, id: Ulid) -> bool {
        let mut state = self.inner.lock();
        state.is_current(id) && state.commit()
    }
}

impl SessionState {
    fn is_current(&self, id: Ulid) -> bool {
        self.transaction.as_ref().is_some_and(|info| info.id == id)
    }

    fn commit(&mut self) -> bool {
        let Some(info) = self.transaction.take() else {
            return false;
        };

        self.committed = std::mem::take(&mut self.staging);

        debug!(
            transaction = %info.id,
            models = self.committed.len(),
            entities = entity_count(&self.committed),
            "transaction committed"
        );
        true
    }

    fn rollback(&mut self) -> bool {
        let Some(info) = self.transaction.take() else {
            return false;
        };

        let discarded = entity_count(&self.staging);
        self.staging.clear();

        debug!(transaction = %info.id, discarded, "transaction rolled back");
        true
    }
}

impl std::fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("InMemorySession")
            .field("models", &state.committed.len())
            .field("transaction", &state.transaction)
            .finish()
    }
}
