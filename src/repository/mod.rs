//! Generic CRUD repositories.
//!
//! [`Repository`] is the backend-agnostic contract. Two implementations
//! share it:
//!
//! ```text
//!                    Repository<T>
//!                   /             \
//!   InMemoryRepository<T>     RelationalRepository<T, S>
//!            │                          │
//!      InMemorySession           RelationalSession
//!   (active storage view)     (external ORM session)
//! ```
//!
//! Validation failures (wrong model, missing or duplicate id, negative
//! pagination) are reported before any mutation. With auto-commit enabled,
//! every mutation that succeeds is committed immediately; otherwise it stays
//! in the session until an outer commit.

mod memory;
mod pagination;
mod relational;

pub use memory::InMemoryRepository;
pub use pagination::Pagination;
pub use relational::{CommitManager, RelationalRepository};

use async_trait::async_trait;

use crate::entity::Entity;
use crate::error::DatabaseResult;

/// Uniform CRUD contract over a storage backend.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Fails with [`EntityNotFound`](crate::DatabaseError::EntityNotFound)
    /// if absent.
    async fn get_by_id(&self, id: &T::Id) -> DatabaseResult<T>;

    /// Entities in insertion order, `offset` skipped and at most `limit`
    /// kept. `limit = None` is unbounded.
    async fn get_all(&self, limit: Option<i64>, offset: i64) -> DatabaseResult<Vec<T>>;

    async fn insert_one(&self, entity: T) -> DatabaseResult<T>;

    /// All or nothing. An empty input is a no-op.
    async fn insert_many(&self, entities: Vec<T>) -> DatabaseResult<Vec<T>>;

    /// Fully replace an existing entity.
    async fn update(&self, entity: T) -> DatabaseResult<T>;

    async fn delete_by_id(&self, id: &T::Id) -> DatabaseResult<()>;

    /// Remove every entity of the model. No-op when already empty.
    async fn delete_all(&self) -> DatabaseResult<()>;
}
