use crate::backend::BackendError;
use crate::error::DatabaseError;
use crate::mapping::{
    ErrorContext, ExceptionMapper, PaginationErrorStrategy, StrategyRegistry,
    UniqueViolationStrategy,
};

/// The mapper the relational repository and unit of work use.
///
/// Tries the pagination strategy first, then the unique-violation strategy.
#[derive(Debug)]
pub struct RelationalExceptionMapper {
    registry: StrategyRegistry,
}

impl RelationalExceptionMapper {
    pub fn new() -> Self {
        Self {
            registry: StrategyRegistry::new()
                .with_strategy(PaginationErrorStrategy)
                .with_strategy(UniqueViolationStrategy),
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }
}

impl Default for RelationalExceptionMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl ExceptionMapper for RelationalExceptionMapper {
    fn map(&self, error: &BackendError, context: &ErrorContext) -> DatabaseError {
        self.registry.map(error, context)
    }
}
