use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{BackendError, BackendErrorKind, SQLSTATE_UNIQUE_VIOLATION};
use crate::error::DatabaseError;
use crate::mapping::{ErrorContext, MappingDeclined, MappingStrategy};

static CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"violates unique constraint "([^"]+)""#).expect("valid constraint regex")
});

const PRIMARY_KEY_SUFFIX: &str = "_pkey";

/// Maps primary-key unique violations to [`DatabaseError::EntityAlreadyExists`].
///
/// Unique violations on any other constraint are declined with
/// [`MappingDeclined::PropagateOriginal`] so that a duplicate email, say,
/// is not reported as an identity conflict.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueViolationStrategy;

impl UniqueViolationStrategy {
    /// Violated constraint name, from the structured field or the message.
    fn constraint_name(error: &BackendError) -> Option<&str> {
        error.constraint().or_else(|| {
            CONSTRAINT_RE
                .captures(error.message())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
        })
    }

    fn is_primary_key_violation(error: &BackendError) -> bool {
        Self::constraint_name(error).is_some_and(|name| name.ends_with(PRIMARY_KEY_SUFFIX))
    }
}

impl MappingStrategy for UniqueViolationStrategy {
    fn name(&self) -> &'static str {
        "unique_violation"
    }

    fn can_handle(&self, error: &BackendError) -> bool {
        error.kind() == BackendErrorKind::Integrity
            && error.sqlstate() == Some(SQLSTATE_UNIQUE_VIOLATION)
    }

    fn map(
        &self,
        error: &BackendError,
        context: &ErrorContext,
    ) -> Result<DatabaseError, MappingDeclined> {
        if !Self::is_primary_key_violation(error) {
            return Err(MappingDeclined::PropagateOriginal {
                reason: format!(
                    "unique violation on non-primary-key constraint {}",
                    Self::constraint_name(error).unwrap_or("<unnamed>")
                ),
            });
        }

        Ok(DatabaseError::already_exists(
            context.entity_type.as_deref().unwrap_or("Entity"),
            context.entity_id.as_deref().unwrap_or("unknown"),
        ))
    }
}
