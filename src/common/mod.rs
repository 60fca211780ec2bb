//! Common types and utilities shared across heapcache.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (TableId, PageId, TransactionId)
//! - Page access permissions

pub mod config;
pub mod error;
mod page_id;
mod permissions;
mod transaction_id;

pub use error::{Error, Result};
pub use page_id::{PageId, TableId};
pub use permissions::Permissions;
pub use transaction_id::TransactionId;
