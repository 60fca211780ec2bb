//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between heap files and memory, bounded by a page count
//! - Page-level locking through the [`LockManager`] (strict 2PL)
//! - LRU eviction restricted to clean pages (no-steal)
//! - Commit by flushing dirty pages (force) and abort by discarding them

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::BufferPoolStats;
use crate::catalog::Catalog;
use crate::common::config::{DEFAULT_DEADLOCK_TIMEOUT, DEFAULT_POOL_PAGES};
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, LockMode, LockOutcome};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

/// Buffer pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Maximum number of cached pages.
    pub num_pages: usize,
    /// How long a lock request may wait before other holders are aborted.
    pub deadlock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_pages: DEFAULT_POOL_PAGES,
            deadlock_timeout: DEFAULT_DEADLOCK_TIMEOUT,
        }
    }
}

impl BufferPoolConfig {
    pub fn with_num_pages(mut self, num_pages: usize) -> Self {
        self.num_pages = num_pages;
        self
    }

    pub fn with_deadlock_timeout(mut self, timeout: Duration) -> Self {
        self.deadlock_timeout = timeout;
        self
    }
}

/// Cached pages and their recency order, guarded together.
struct Cache {
    pages: HashMap<PageId, Arc<HeapPage>>,
    replacer: LruReplacer,
}

/// Caches heap pages for concurrent transactions.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────────────┐
/// │                         BufferPool                            │
/// │  ┌─────────────────────────────────┐   ┌──────────────────┐   │
/// │  │ cache: Mutex                    │   │  lock_manager    │   │
/// │  │  pages: PageId → Arc<HeapPage>  │   │  PageId → lock   │   │
/// │  │  replacer: LruReplacer          │   │  tid → pages     │   │
/// │  └─────────────────────────────────┘   └──────────────────┘   │
/// │  ┌──────────────┐   ┌──────────────┐                          │
/// │  │   catalog    │   │    stats     │                          │
/// │  │ TableId →    │   │   atomics    │                          │
/// │  │  HeapFile    │   │              │                          │
/// │  └──────────────┘   └──────────────┘                          │
/// └───────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pages
/// [`get_page`](Self::get_page) returns an immutable snapshot. Changes are
/// made on a copy by the heap file and installed back through
/// [`insert_tuple`](Self::insert_tuple) / [`delete_tuple`](Self::delete_tuple),
/// which mark the page dirty with the writing transaction. Later reads
/// through the pool, by the same transaction, see the change at once.
///
/// # Thread Safety
/// - `cache`: `Mutex`, held only for lookups, loads and installs
/// - `lock_manager`: internal mutex + condvar; lock waits happen with the
///   cache mutex released
/// - `stats`: no lock, atomic counters
///
/// Lock order is cache mutex, then lock table mutex. The lock manager never
/// calls back into the pool.
///
/// # Usage
/// ```ignore
/// let pool = BufferPool::new(50, catalog);
/// let tid = TransactionId::new();
///
/// pool.insert_tuple(tid, table_id, &mut tuple)?;
/// let page = pool.get_page(tid, pid, Permissions::ReadOnly)?;
/// pool.commit(tid)?;
/// ```
pub struct BufferPool {
    cache: Mutex<Cache>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    stats: BufferPoolStats,
    capacity: usize,
}

impl BufferPool {
    /// Create a buffer pool caching at most `num_pages` pages, with the
    /// default deadlock timeout.
    ///
    /// # Panics
    /// Panics if `num_pages` is 0.
    pub fn new(num_pages: usize, catalog: Arc<Catalog>) -> Self {
        Self::with_config(BufferPoolConfig::default().with_num_pages(num_pages), catalog)
    }

    /// Create a buffer pool from explicit settings.
    ///
    /// # Panics
    /// Panics if `config.num_pages` is 0.
    pub fn with_config(config: BufferPoolConfig, catalog: Arc<Catalog>) -> Self {
        assert!(config.num_pages > 0, "num_pages must be > 0");

        Self {
            cache: Mutex::new(Cache {
                pages: HashMap::with_capacity(config.num_pages),
                replacer: LruReplacer::new(),
            }),
            lock_manager: LockManager::new(config.deadlock_timeout),
            catalog,
            stats: BufferPoolStats::new(),
            capacity: config.num_pages,
        }
    }

    // ========================================================================
    // Public API: Page access
    // ========================================================================

    /// Lock `pid` for `tid` and return the cached page, loading it if needed.
    ///
    /// `ReadOnly` takes a shared lock, `ReadWrite` an exclusive one. The
    /// call blocks while a conflicting lock is held. If the wait exceeds the
    /// deadlock timeout, every other lock holder is aborted and the request
    /// proceeds.
    ///
    /// # Errors
    /// - `Error::TransactionAborted` if `tid` was chosen as a deadlock victim
    /// - `Error::BufferPoolFull` if the page must be loaded and every cached page is dirty
    /// - `Error::UnknownTable` / `Error::PageNotFound` / I/O errors from the load
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<Arc<HeapPage>> {
        self.lock(tid, pid, perm.lock_mode())?;

        let mut cache = self.cache.lock();
        // A waiter may have picked us as a victim since the grant.
        self.ensure_active(tid)?;

        if let Some(page) = cache.pages.get(&pid).cloned() {
            cache.replacer.record_access(pid);
            BufferPoolStats::bump(&self.stats.cache_hits);
            trace!(%tid, %pid, "cache hit");
            return Ok(page);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        trace!(%tid, %pid, "cache miss");

        if cache.pages.len() >= self.capacity {
            self.evict(&mut cache)?;
        }

        let file = self.catalog.file(pid.table_id())?;
        let page = Arc::new(file.read_page(pid)?);
        BufferPoolStats::bump(&self.stats.pages_read);

        cache.pages.insert(pid, Arc::clone(&page));
        cache.replacer.record_access(pid);
        cache.replacer.set_evictable(pid, true);
        Ok(page)
    }

    // ========================================================================
    // Public API: Tuple changes
    // ========================================================================

    /// Add `tuple` to table `table_id` on behalf of `tid`.
    ///
    /// The heap file picks the page and write-locks it; the modified page is
    /// cached dirty under `tid`. On success the tuple carries its new record
    /// id. Returns the ids of the dirtied pages.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageId>> {
        self.ensure_active(tid)?;
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.install(tid, pages)
    }

    /// Remove `tuple` (located by its record id) on behalf of `tid`.
    /// Returns the ids of the dirtied pages.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<Vec<PageId>> {
        self.ensure_active(tid)?;
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        let file = self.catalog.file(rid.page_id.table_id())?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.install(tid, pages)
    }

    // ========================================================================
    // Public API: Transaction completion
    // ========================================================================

    /// Commit `tid`: flush its dirty pages, then release its locks.
    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, true)
    }

    /// Abort `tid`: discard the pages it touched, then release its locks.
    pub fn abort(&self, tid: TransactionId) -> Result<()> {
        self.transaction_complete(tid, false)
    }

    /// Finish `tid` by committing or aborting.
    ///
    /// Aborting is idempotent and is the only way to finish a transaction
    /// that was chosen as a deadlock victim.
    ///
    /// # Errors
    /// - `Error::TransactionAborted` when committing a deadlock victim
    /// - I/O errors while flushing; locks are kept so the caller can abort
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        if commit {
            let flushed = {
                let mut cache = self.cache.lock();
                // Under the cache mutex: once this passes, no waiter can
                // discard our pages before they are written.
                self.ensure_active(tid)?;
                self.flush_dirty(&mut cache, tid)?
            };
            self.lock_manager.complete(tid);
            debug!(%tid, flushed, "transaction committed");
            return Ok(());
        }

        let was_victim = self.lock_manager.is_aborted(tid);
        let touched = self.lock_manager.pages_held(tid);
        let discarded = {
            let mut cache = self.cache.lock();
            let mut doomed: Vec<PageId> = cache
                .pages
                .iter()
                .filter(|(_, page)| page.dirtier() == Some(tid))
                .map(|(&pid, _)| pid)
                .collect();
            for pid in touched.iter().copied() {
                // never drop another transaction's uncommitted work
                let clean = cache.pages.get(&pid).is_some_and(|page| !page.is_dirty());
                if clean {
                    doomed.push(pid);
                }
            }
            for &pid in &doomed {
                Self::remove_cached(&mut cache, pid);
            }
            doomed.len()
        };
        self.lock_manager.complete(tid);

        if was_victim || !touched.is_empty() {
            BufferPoolStats::bump(&self.stats.aborts);
        }
        debug!(%tid, discarded, was_victim, "transaction aborted");
        Ok(())
    }

    // ========================================================================
    // Public API: Locks
    // ========================================================================

    /// Whether `tid` holds any lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    /// Release `tid`'s lock on `pid` before the transaction ends.
    ///
    /// This breaks two-phase locking; only use it for pages the transaction
    /// did not change.
    ///
    /// # Errors
    /// `Error::PageNeverLocked` if no transaction ever locked `pid`.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        self.lock_manager.release(tid, pid)
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Write `pid` to disk if it is cached and dirty, and mark it clean.
    ///
    /// This writes uncommitted data if the page holds any; it is meant for
    /// recovery hooks and tests, not normal transaction flow.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let mut cache = self.cache.lock();
        self.flush_cached(&mut cache, pid)?;
        Ok(())
    }

    /// Write every page dirtied by `tid` to disk and mark them clean.
    /// Returns the number of pages written.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<usize> {
        let mut cache = self.cache.lock();
        self.flush_dirty(&mut cache, tid)
    }

    /// Write every dirty cached page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        let pids: Vec<PageId> = cache.pages.keys().copied().collect();
        for pid in pids {
            self.flush_cached(&mut cache, pid)?;
        }
        Ok(())
    }

    /// Drop `pid` from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        let mut cache = self.cache.lock();
        if Self::remove_cached(&mut cache, pid) {
            debug!(%pid, "discarded page");
        }
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Maximum number of cached pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.cache.lock().pages.len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.cache.lock().pages.contains_key(&pid)
    }

    pub fn deadlock_timeout(&self) -> Duration {
        self.lock_manager.timeout()
    }

    // ========================================================================
    // Internal: Locking and deadlock victims
    // ========================================================================

    fn ensure_active(&self, tid: TransactionId) -> Result<()> {
        if self.lock_manager.is_aborted(tid) {
            Err(Error::TransactionAborted(tid))
        } else {
            Ok(())
        }
    }

    fn lock(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<()> {
        loop {
            match self.lock_manager.acquire(tid, pid, mode)? {
                LockOutcome::Granted => return Ok(()),
                LockOutcome::Deadlock { victims } => {
                    BufferPoolStats::bump(&self.stats.deadlocks);
                    for victim in victims {
                        self.abort_victim(victim);
                    }
                }
            }
        }
    }

    /// Throw away a deadlock victim's uncommitted pages and free its locks.
    /// The victim stays marked aborted until it completes.
    fn abort_victim(&self, victim: TransactionId) {
        {
            let mut cache = self.cache.lock();
            let dirty: Vec<PageId> = cache
                .pages
                .iter()
                .filter(|(_, page)| page.dirtier() == Some(victim))
                .map(|(&pid, _)| pid)
                .collect();
            for pid in dirty {
                Self::remove_cached(&mut cache, pid);
            }
        }
        let released = self.lock_manager.release_all(victim);
        debug!(%victim, released = released.len(), "deadlock victim rolled back");
    }

    // ========================================================================
    // Internal: Cache maintenance
    // ========================================================================

    /// Put modified page copies into the cache, dirty under `tid`.
    fn install(&self, tid: TransactionId, pages: Vec<HeapPage>) -> Result<Vec<PageId>> {
        let mut cache = self.cache.lock();
        // Checked under the cache mutex so a victim can never re-dirty a
        // page after its pages were discarded.
        self.ensure_active(tid)?;

        let mut dirtied = Vec::with_capacity(pages.len());
        for mut page in pages {
            let pid = page.id();
            page.mark_dirty(Some(tid));

            if !cache.pages.contains_key(&pid) && cache.pages.len() >= self.capacity {
                self.evict(&mut cache)?;
            }
            cache.pages.insert(pid, Arc::new(page));
            cache.replacer.record_access(pid);
            cache.replacer.set_evictable(pid, false);
            dirtied.push(pid);
        }
        trace!(%tid, pages = dirtied.len(), "installed dirty pages");
        Ok(dirtied)
    }

    /// Drop the least recently used clean page.
    fn evict(&self, cache: &mut Cache) -> Result<()> {
        let victim = cache.replacer.evict().ok_or(Error::BufferPoolFull {
            capacity: self.capacity,
        })?;
        cache.pages.remove(&victim);
        BufferPoolStats::bump(&self.stats.evictions);
        debug!(pid = %victim, "evicted page");
        Ok(())
    }

    fn flush_dirty(&self, cache: &mut Cache, tid: TransactionId) -> Result<usize> {
        let dirty: Vec<PageId> = cache
            .pages
            .iter()
            .filter(|(_, page)| page.dirtier() == Some(tid))
            .map(|(&pid, _)| pid)
            .collect();

        for &pid in &dirty {
            self.flush_cached(cache, pid)?;
        }
        Ok(dirty.len())
    }

    /// Write one cached page if dirty and replace it with a clean copy whose
    /// before-image is the flushed bytes. Returns whether anything was written.
    fn flush_cached(&self, cache: &mut Cache, pid: PageId) -> Result<bool> {
        let Some(page) = cache.pages.get(&pid) else {
            return Ok(false);
        };
        if !page.is_dirty() {
            return Ok(false);
        }

        let file = self.catalog.file(pid.table_id())?;
        file.write_page(page)?;
        BufferPoolStats::bump(&self.stats.pages_written);

        let mut clean = HeapPage::clone(page);
        clean.mark_dirty(None);
        clean.set_before_image();
        cache.pages.insert(pid, Arc::new(clean));
        cache.replacer.set_evictable(pid, true);
        debug!(%pid, "flushed page");
        Ok(true)
    }

    fn remove_cached(cache: &mut Cache, pid: PageId) -> bool {
        cache.replacer.remove(pid);
        cache.pages.remove(&pid).is_some()
    }
}
