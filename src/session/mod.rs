//! Transactional in-memory session.
//!
//! ```text
//!             begin: deep copy
//!  committed ─────────────────► staging
//!      ▲                           │
//!      │  commit: replace          │ reads / writes while
//!      └───────────────────────────┤ a transaction is open
//!                                  │
//!                 rollback: discard┘
//! ```
//!
//! Outside a transaction, repositories read and write committed storage
//! directly. A session is shared by cloning it; every clone sees the same
//! committed storage, staging area and transaction state.

mod guard;
mod memory;
pub(crate) mod store;

pub use guard::SessionGuard;
pub use memory::{InMemorySession, TransactionInfo};
pub use store::StorageMap;
