use tracing::{debug, warn};

use crate::backend::BackendError;
use crate::error::DatabaseError;
use crate::mapping::{ErrorContext, ExceptionMapper, MappingStrategy};

/// Ordered chain of mapping strategies.
///
/// Strategies are tried in registration order. The first one whose
/// `can_handle` accepts the error attempts to map it; if it declines, the
/// next one gets a chance. When every strategy passes, the error becomes a
/// generic [`DatabaseError::Database`] carrying the original as its source.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn MappingStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy to the end of the chain.
    pub fn register(&mut self, strategy: impl MappingStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_strategy(mut self, strategy: impl MappingStrategy + 'static) -> Self {
        self.register(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names in registration order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Map `error` through the chain. Always returns a domain error.
    pub fn map(&self, error: &BackendError, context: &ErrorContext) -> DatabaseError {
        for strategy in &self.strategies {
            if !strategy.can_handle(error) {
                continue;
            }

            match strategy.map(error, context) {
                Ok(mapped) => return mapped.caused_by(error.clone()),
                Err(declined) => {
                    debug!(
                        strategy = strategy.name(),
                        reason = %declined,
                        "mapping strategy declined; trying the next one"
                    );
                }
            }
        }

        warn!(
            entity_type = context.entity_type.as_deref().unwrap_or("unknown entity"),
            error = %error,
            "no mapping strategy matched backend error"
        );
        DatabaseError::unclassified(context.entity_type.as_deref(), error.clone())
    }
}

impl ExceptionMapper for StrategyRegistry {
    fn map(&self, error: &BackendError, context: &ErrorContext) -> DatabaseError {
        StrategyRegistry::map(self, error, context)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
