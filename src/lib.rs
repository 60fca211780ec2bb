//! heapcache - A transactional page cache over heap-file storage.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Query operators / recovery hooks                │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Buffer Pool (buffer/)                        │
//! │   get_page · insert_tuple · delete_tuple · transaction_complete │
//! │   ┌──────────────────────┐     ┌────────────────────────────┐   │
//! │   │ page cache + LRU     │     │ Lock Manager (concurrency/)│   │
//! │   │ (clean-only evict)   │     │ strict 2PL, 150ms timeout  │   │
//! │   └──────────────────────┘     └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │      Catalog (catalog)  →  Heap File (storage/)                 │
//! │                          HeapPage codec: bitmap + slots         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Buffer management is no-steal/force: a page with uncommitted changes is
//! never written before its transaction commits, and commit writes all of
//! them. Abort therefore only has to drop the cached copies.
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, Error, config)
//! - [`tuple`] - Field types, tuple descriptors and tuples
//! - [`storage`] - Heap files and the heap page format
//! - [`concurrency`] - Page-level lock manager
//! - [`buffer`] - Buffer pool, eviction policy and statistics
//! - [`catalog`] - Table registry
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use heapcache::{BufferPool, Catalog, Field, HeapFile, Tuple, TupleDesc, TransactionId, Type};
//!
//! let desc = Arc::new(TupleDesc::with_names(&[Type::Int, Type::Text], &["id", "name"]));
//! let file = Arc::new(HeapFile::open_or_create("users.dat", Arc::clone(&desc)).unwrap());
//!
//! let catalog = Arc::new(Catalog::new());
//! let table = catalog.add_table(Arc::clone(&file), "users", "id");
//! let pool = BufferPool::new(50, catalog);
//!
//! let tid = TransactionId::new();
//! let mut row = Tuple::new(desc, vec![Field::Int(1), Field::Text("ada".into())]).unwrap();
//! pool.insert_tuple(tid, table, &mut row).unwrap();
//! pool.commit(tid).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod storage;
pub mod tuple;

// Re-export commonly used items at crate root for convenience
pub use common::config::DEFAULT_PAGE_SIZE;
pub use common::{Error, PageId, Permissions, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolConfig, BufferPoolStats, StatsSnapshot};
pub use catalog::Catalog;
pub use concurrency::{LockManager, LockMode};
pub use storage::page::HeapPage;
pub use storage::{HeapFile, HeapFileIter};
pub use tuple::{Field, RecordId, Tuple, TupleDesc, Type};
