//! Concurrency control.
//!
//! - [`LockManager`] - Page-level shared/exclusive locks, strict 2PL
//!   bookkeeping, and timeout-based deadlock breaking

mod lock_manager;

pub use lock_manager::{LockManager, LockMode, LockOutcome};
