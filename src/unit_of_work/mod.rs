//! Units of work.
//!
//! A unit of work owns one session and one repository per registered entity
//! model, all sharing that session, so writes through any of them commit or
//! roll back together.
//!
//! ```text
//! InMemoryUnitOfWork
//!   ├─ InMemorySession  (transaction begun on open)
//!   ├─ InMemoryRepository<User>   ─┐
//!   └─ InMemoryRepository<Order>  ─┴─► session.with_active_storage(..)
//! ```
//!
//! Repositories inside a unit of work never auto-commit. Nothing persists
//! without an explicit [`UnitOfWork::commit`]; leaving a scoped run rolls
//! back whatever was not committed.

mod memory;
mod relational;

pub use memory::{InMemoryUnitOfWork, InMemoryUnitOfWorkBuilder};
pub use relational::{RelationalUnitOfWork, RelationalUnitOfWorkBuilder};

use async_trait::async_trait;

use crate::error::DatabaseResult;

/// A single commit/rollback boundary spanning several repositories.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Persist every change made through the unit's repositories.
    async fn commit(&self) -> DatabaseResult<()>;

    /// Discard every uncommitted change.
    async fn rollback(&self) -> DatabaseResult<()>;

    /// Roll back and release the session.
    async fn close(&self) -> DatabaseResult<()>;
}
