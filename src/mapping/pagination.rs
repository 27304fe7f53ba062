use crate::backend::BackendError;
use crate::error::{DatabaseError, ParameterValue};
use crate::mapping::{ErrorContext, MappingDeclined, MappingStrategy};

const NEGATIVE_LIMIT: &str = "LIMIT must not be negative";
const NEGATIVE_OFFSET: &str = "OFFSET must not be negative";

/// Maps the driver's negative `LIMIT`/`OFFSET` rejection to
/// [`DatabaseError::PaginationParameter`].
///
/// The driver does not echo the offending value back, so it is reported as
/// [`ParameterValue::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PaginationErrorStrategy;

impl PaginationErrorStrategy {
    fn parameter(message: &str) -> Option<&'static str> {
        if message.contains(NEGATIVE_LIMIT) {
            Some("limit")
        } else if message.contains(NEGATIVE_OFFSET) {
            Some("offset")
        } else {
            None
        }
    }
}

impl MappingStrategy for PaginationErrorStrategy {
    fn name(&self) -> &'static str {
        "pagination"
    }

    fn can_handle(&self, error: &BackendError) -> bool {
        error.kind().is_driver_error() && Self::parameter(error.message()).is_some()
    }

    fn map(
        &self,
        error: &BackendError,
        _context: &ErrorContext,
    ) -> Result<DatabaseError, MappingDeclined> {
        let parameter = Self::parameter(error.message()).ok_or(MappingDeclined::NotApplicable)?;
        Ok(DatabaseError::pagination(parameter, ParameterValue::Unknown))
    }
}
