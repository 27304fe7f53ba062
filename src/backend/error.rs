//! Low-level errors raised by a relational backend.
//!
//! These mirror what a database driver hands back: a coarse kind, the
//! SQLSTATE code when the server sent one, the violated constraint when the
//! driver reports it, and the raw server message. Mapping strategies inspect
//! these fields to decide which domain error to produce.

use std::fmt;

use thiserror::Error;

/// SQLSTATE for `unique_violation`.
pub const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for `invalid_row_count_in_limit_clause`.
pub const SQLSTATE_INVALID_LIMIT: &str = "2201W";

/// SQLSTATE for `invalid_row_count_in_result_offset_clause`.
pub const SQLSTATE_INVALID_OFFSET: &str = "2201X";

/// Result type alias for backend session calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Coarse classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Constraint violation reported by the server (unique, foreign key, not null).
    Integrity,
    /// Any other error raised by the driver while executing a statement.
    Driver,
    /// The connection was lost or could not be established.
    Connection,
    /// Failure inside the session itself, before reaching the driver.
    Session,
}

impl BackendErrorKind {
    /// Check whether the failure came from the database driver.
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            BackendErrorKind::Integrity | BackendErrorKind::Driver | BackendErrorKind::Connection
        )
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Integrity => write!(f, "integrity"),
            BackendErrorKind::Driver => write!(f, "driver"),
            BackendErrorKind::Connection => write!(f, "connection"),
            BackendErrorKind::Session => write!(f, "session"),
        }
    }
}

/// An error raised by a relational backend session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    sqlstate: Option<String>,
    constraint: Option<String>,
    message: String,
}

impl BackendError {
    /// Create an error of the given kind.
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sqlstate: None,
            constraint: None,
            message: message.into(),
        }
    }

    /// Create an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Integrity, message)
    }

    /// Create a generic driver error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Driver, message)
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Connection, message)
    }

    /// Create a session-level error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Session, message)
    }

    /// The error PostgreSQL raises for a duplicate key on `constraint`.
    pub fn unique_violation(constraint: impl Into<String>) -> Self {
        let constraint = constraint.into();
        Self::integrity(format!(
            "duplicate key value violates unique constraint \"{constraint}\""
        ))
        .with_sqlstate(SQLSTATE_UNIQUE_VIOLATION)
        .with_constraint(constraint)
    }

    /// Attach a SQLSTATE code.
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    /// Attach the name of the violated constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn sqlstate(&self) -> Option<&str> {
        self.sqlstate.as_deref()
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// The raw message reported by the server or driver.
    pub fn message(&self) -> &str {
        &self.message
    }
}
