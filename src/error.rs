//! Domain error taxonomy.
//!
//! Every failure a repository, unit of work or session reports is a
//! [`DatabaseError`]. Backend-specific failures never leak out raw: they are
//! mapped into one of these variants and kept as the error's `source()`.

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for repository, session and unit of work operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The value reported for an invalid pagination parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterValue {
    Known(i64),
    /// The backend rejected the parameter without echoing the value back.
    Unknown,
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Known(value) => write!(f, "{value}"),
            ParameterValue::Unknown => write!(f, "unknown"),
        }
    }
}

/// Root of the domain error taxonomy.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// The requested identity is absent.
    #[error("{entity_type} with id '{entity_id}' not found")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    /// An insert collided with an existing identity.
    #[error("{entity_type} with id '{entity_id}' already exists")]
    EntityAlreadyExists {
        entity_type: String,
        entity_id: String,
        #[source]
        source: Option<BackendError>,
    },

    /// The supplied entity does not belong to the repository's model.
    #[error("entity must be of type {expected}, got {actual}")]
    EntityModel { expected: String, actual: String },

    /// A negative `limit` or `offset`.
    #[error("{parameter} must be non-negative, got {value}")]
    PaginationParameter {
        parameter: String,
        value: ParameterValue,
        #[source]
        source: Option<BackendError>,
    },

    /// `begin` was called while a transaction is open.
    #[error("transaction {transaction_id} already in progress; commit or rollback before starting a new one")]
    TransactionAlreadyActive { transaction_id: String },

    /// Anything the mapping registry could not classify.
    #[error("database error during operation on {}: {message}", .entity_type.as_deref().unwrap_or("unknown entity"))]
    Database {
        entity_type: Option<String>,
        message: String,
        #[source]
        source: Option<BackendError>,
    },
}

impl DatabaseError {
    pub fn not_found(entity_type: impl fmt::Display, entity_id: impl fmt::Display) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
        }
    }

    pub fn already_exists(entity_type: impl fmt::Display, entity_id: impl fmt::Display) -> Self {
        Self::EntityAlreadyExists {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            source: None,
        }
    }

    pub fn model_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::EntityModel {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn pagination(parameter: impl Into<String>, value: ParameterValue) -> Self {
        Self::PaginationParameter {
            parameter: parameter.into(),
            value,
            source: None,
        }
    }

    /// Generic error wrapping an unclassified backend failure.
    pub fn unclassified(entity_type: Option<&str>, error: BackendError) -> Self {
        Self::Database {
            entity_type: entity_type.map(str::to_string),
            message: error.to_string(),
            source: Some(error),
        }
    }

    /// Attach the backend error this domain error was mapped from.
    pub fn caused_by(mut self, cause: BackendError) -> Self {
        match &mut self {
            Self::EntityAlreadyExists { source, .. }
            | Self::PaginationParameter { source, .. }
            | Self::Database { source, .. } => *source = Some(cause),
            Self::EntityNotFound { .. }
            | Self::EntityModel { .. }
            | Self::TransactionAlreadyActive { .. } => {}
        }
        self
    }

    /// check if this error indicates the entity doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::EntityNotFound { .. })
    }

    /// check if this error is an identity or transaction conflict
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DatabaseError::EntityAlreadyExists { .. } | DatabaseError::TransactionAlreadyActive { .. }
        )
    }

    /// check if this error was raised by input validation, before any mutation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DatabaseError::EntityModel { .. } | DatabaseError::PaginationParameter { .. }
        )
    }

    /// The entity type involved, when known.
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::EntityNotFound { entity_type, .. }
            | Self::EntityAlreadyExists { entity_type, .. } => Some(entity_type),
            Self::EntityModel { expected, .. } => Some(expected),
            Self::Database { entity_type, .. } => entity_type.as_deref(),
            Self::PaginationParameter { .. } | Self::TransactionAlreadyActive { .. } => None,
        }
    }

    /// The entity identifier involved, when known.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::EntityNotFound { entity_id, .. }
            | Self::EntityAlreadyExists { entity_id, .. } => Some(entity_id),
            _ => None,
        }
    }
}
