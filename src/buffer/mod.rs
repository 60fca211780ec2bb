//! Buffer pool management.
//!
//! The buffer pool is the in-memory page cache between query operators and
//! heap files. It also owns the lock manager, so every page access is
//! covered by a transaction's lock.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`BufferPoolConfig`] - Capacity and deadlock timeout
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::{BufferPool, BufferPoolConfig};
pub use stats::{BufferPoolStats, StatsSnapshot};
