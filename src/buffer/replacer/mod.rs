//! Eviction policy (replacer).
//!
//! - [`LruReplacer`] - Least-recently-used order over clean pages

mod lru;

pub use lru::LruReplacer;
