//! Storage layer - heap files and page formats.
//!
//! This module handles persistent storage:
//! - [`HeapFile`] - One table's pages on disk, plus tuple placement
//! - [`page`] - The heap page codec

mod heap_file;
pub mod page;

pub use heap_file::{HeapFile, HeapFileIter};
