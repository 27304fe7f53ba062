//! Relational backend collaborator interfaces.
//!
//! The relational repository does not talk to a database driver itself. It
//! drives a [`RelationalSession`], an ORM-style session supplied by the
//! application, and classifies the session's [`BackendError`]s through the
//! mapping registry.
//!
//! ```text
//! RelationalRepository ──► RelationalSession ──► driver / database
//!          │                      │
//!          │                 BackendError
//!          ▼                      │
//!   ExceptionMapper ◄─────────────┘
//!          │
//!          ▼
//!    DatabaseError
//! ```

mod error;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{
    BackendError, BackendErrorKind, BackendResult, SQLSTATE_INVALID_LIMIT,
    SQLSTATE_INVALID_OFFSET, SQLSTATE_UNIQUE_VIOLATION,
};
pub use session::{RelationalSession, SessionFactory, Statement};
