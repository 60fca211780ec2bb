//! Page formats.
//!
//! This module contains:
//! - [`HeapPage`] - Fixed-size page of tuple slots with an occupancy bitmap

mod heap_page;

pub use heap_page::HeapPage;
