use thiserror::Error;

use crate::backend::BackendError;
use crate::error::DatabaseError;

/// Entity details available where a backend error was caught.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_type(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            entity_id: None,
        }
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Why a strategy chose not to map an error it claimed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingDeclined {
    /// The error matched `can_handle` but turned out to be outside the
    /// strategy's scope.
    #[error("strategy does not apply to this error")]
    NotApplicable,

    /// The original error should reach the caller unclassified.
    #[error("original error left unmapped: {reason}")]
    PropagateOriginal { reason: String },
}

/// One rule translating a class of backend errors into a domain error.
pub trait MappingStrategy: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Cheap signature check. Only strategies that return `true` get to `map`.
    fn can_handle(&self, error: &BackendError) -> bool;

    /// Translate `error`, or decline so the registry tries the next strategy.
    fn map(
        &self,
        error: &BackendError,
        context: &ErrorContext,
    ) -> Result<DatabaseError, MappingDeclined>;
}

/// Turns any backend error into a domain error. Never fails.
pub trait ExceptionMapper: Send + Sync {
    fn map(&self, error: &BackendError, context: &ErrorContext) -> DatabaseError;
}
