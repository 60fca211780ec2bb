//! LRU (Least-Recently-Used) replacement policy.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::common::PageId;

/// Least-recently-used eviction order over cached pages.
///
/// Every access stamps the page with a monotonically increasing counter;
/// the smallest stamp is the least recently used page. Only pages marked
/// evictable (clean pages, in the buffer pool) can be chosen as victims.
#[derive(Debug, Default)]
pub struct LruReplacer {
    clock: u64,
    /// Latest access stamp of each tracked page.
    stamps: HashMap<PageId, u64>,
    /// Stamp -> page, oldest first.
    order: BTreeMap<u64, PageId>,
    evictable: HashSet<PageId>,
}

impl LruReplacer {
    /// Create an empty replacer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a page was accessed, making it the most recently used.
    pub fn record_access(&mut self, pid: PageId) {
        if let Some(old) = self.stamps.remove(&pid) {
            self.order.remove(&old);
        }
        self.clock += 1;
        self.stamps.insert(pid, self.clock);
        self.order.insert(self.clock, pid);
    }

    /// Mark whether a tracked page may be evicted.
    pub fn set_evictable(&mut self, pid: PageId, evictable: bool) {
        if evictable && self.stamps.contains_key(&pid) {
            self.evictable.insert(pid);
        } else {
            self.evictable.remove(&pid);
        }
    }

    /// Select and forget the least recently used evictable page.
    ///
    /// Returns None if no tracked page is evictable.
    pub fn evict(&mut self) -> Option<PageId> {
        let (&stamp, &pid) = self
            .order
            .iter()
            .find(|(_, pid)| self.evictable.contains(pid))?;
        self.order.remove(&stamp);
        self.stamps.remove(&pid);
        self.evictable.remove(&pid);
        Some(pid)
    }

    /// Stop tracking a page.
    pub fn remove(&mut self, pid: PageId) {
        if let Some(stamp) = self.stamps.remove(&pid) {
            self.order.remove(&stamp);
        }
        self.evictable.remove(&pid);
    }

    /// Number of evictable pages.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }

    /// Tracked pages from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = PageId> + '_ {
        self.order.values().copied()
    }
}
