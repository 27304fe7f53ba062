//! Repokit - repositories and units of work over interchangeable storage backends
//!
//! This crate provides one CRUD contract ([`repository::Repository`]) for
//! in-memory maps and for relational databases reached through an external
//! session, plus a unit of work that groups several repositories behind a
//! single commit/rollback boundary.
//!
//! The in-memory backend has no transaction log of its own. Its
//! [`session::InMemorySession`] simulates atomic, isolated transactions with
//! snapshot-and-replace: `begin` clones the committed state into a staging
//! area, `commit` replaces the committed state with the staging area, and
//! `rollback` throws the staging area away.
//!
//! # Example
//!
//! ```no_run
//! use repokit::entity::Entity;
//! use repokit::repository::{InMemoryRepository, Repository};
//!
//! #[derive(Debug, Clone)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     type Id = String;
//!
//!     fn id(&self) -> &String {
//!         &self.id
//!     }
//! }
//!
//! # async fn run() -> repokit::error::DatabaseResult<()> {
//! let users = InMemoryRepository::<User>::new();
//! users.insert_one(User { id: "u1".into(), name: "Alice".into() }).await?;
//! let alice = users.get_by_id(&"u1".to_string()).await?;
//! assert_eq!(alice.name, "Alice");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod entity;
pub mod error;
pub mod mapping;
pub mod repository;
pub mod session;
pub mod unit_of_work;

pub use entity::{Entity, EntityKey, EntityModel};
pub use error::{DatabaseError, DatabaseResult};
