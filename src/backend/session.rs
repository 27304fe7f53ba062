//! Collaborator contract for relational sessions.

use async_trait::async_trait;

use crate::backend::error::BackendResult;
use crate::entity::{Entity, EntityKey, EntityModel};

/// A statement executed for its side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Delete every row of a model's table.
    DeleteAll(EntityModel),
    /// Backend-specific statement text.
    Raw(String),
}

/// An ORM-style unit of database interaction.
///
/// Implementations buffer changes until `commit`, the way an ORM session
/// does, and surface driver failures as [`BackendError`]s that the mapping
/// registry can classify.
///
/// [`BackendError`]: crate::backend::BackendError
#[async_trait]
pub trait RelationalSession: Send + Sync {
    /// Fetch one entity by its identifier.
    async fn fetch<T: Entity>(&self, model: EntityModel, key: &EntityKey)
        -> BackendResult<Option<T>>;

    /// Run a limited/offset query over a model's rows.
    ///
    /// `limit` and `offset` are passed through untouched; rejecting negative
    /// values is the database's job.
    async fn select<T: Entity>(
        &self,
        model: EntityModel,
        limit: Option<i64>,
        offset: i64,
    ) -> BackendResult<Vec<T>>;

    /// Stage a new entity.
    async fn add<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<()>;

    /// Stage several new entities.
    async fn add_all<T: Entity>(&self, model: EntityModel, entities: Vec<T>) -> BackendResult<()>;

    /// Upsert by identity, returning the merged entity.
    async fn merge<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<T>;

    /// Stage the deletion of a persistent entity.
    async fn delete<T: Entity>(&self, model: EntityModel, entity: T) -> BackendResult<()>;

    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, statement: Statement) -> BackendResult<u64>;

    async fn commit(&self) -> BackendResult<()>;

    async fn rollback(&self) -> BackendResult<()>;

    async fn close(&self) -> BackendResult<()>;
}

/// Produces fresh relational sessions.
pub trait SessionFactory: Send + Sync {
    type Session: RelationalSession;

    fn open(&self) -> Self::Session;
}

impl<F, S> SessionFactory for F
where
    F: Fn() -> S + Send + Sync,
    S: RelationalSession,
{
    type Session = S;

    fn open(&self) -> S {
        self()
    }
}
