//! Backend error to domain error mapping.
//!
//! ```text
//! BackendError
//!      │
//!      ▼
//! ┌──────────────────────────────────────────┐
//! │ StrategyRegistry                         │
//! │  for each strategy, in order:            │
//! │    can_handle? ── no ──► next            │
//! │        │ yes                             │
//! │        ▼                                 │
//! │      map ── Ok ──► DatabaseError (done)  │
//! │        │                                 │
//! │        └── MappingDeclined ──► next      │
//! │                                          │
//! │  exhausted ──► DatabaseError::Database   │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The registry never fails. A mapped error keeps the backend error as its
//! `source()`.

mod pagination;
mod registry;
mod relational;
mod strategy;
mod unique_violation;

pub use pagination::PaginationErrorStrategy;
pub use registry::StrategyRegistry;
pub use relational::RelationalExceptionMapper;
pub use strategy::{ErrorContext, ExceptionMapper, MappingDeclined, MappingStrategy};
pub use unique_violation::UniqueViolationStrategy;
