//! Page-level lock manager for strict two-phase locking.
//!
//! The [`LockManager`] owns every piece of lock state: the per-page lock
//! table and the per-transaction read/write lock sets. Nothing outside this
//! module can touch the raw maps, so the two views never disagree.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::common::{Error, PageId, Result, TransactionId};

/// Lock modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock; compatible with other shared locks.
    Shared,
    /// Write lock; compatible with nothing held by another transaction.
    Exclusive,
}

/// Result of a lock request that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock is held.
    Granted,
    /// The wait exceeded the deadlock timeout.
    ///
    /// `victims` (every other transaction holding a lock) are now marked
    /// aborted. The caller must throw away their uncommitted pages, call
    /// [`LockManager::release_all`] for each, and then retry the request.
    Deadlock { victims: Vec<TransactionId> },
}

/// Lock state of a single page.
///
/// ```text
/// FREE ──read──▶ SHARED{t}     FREE ──write──▶ EXCLUSIVE{t}
/// SHARED{s} ──read(t)──▶ SHARED{s ∪ t}     (only if no writer is waiting)
/// SHARED{t} ──write(t)──▶ EXCLUSIVE{t}     (upgrade, t must be the sole reader)
/// last release ──▶ FREE
/// ```
#[derive(Debug, Default)]
struct PageLock {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
    /// Exclusive requests currently blocked on this page.
    waiting_writers: usize,
}

impl PageLock {
    fn can_grant(&self, tid: TransactionId, mode: LockMode) -> bool {
        match (self.writer, mode) {
            (Some(writer), _) => writer == tid,
            // New readers queue behind waiting writers; existing readers
            // re-requesting are already satisfied.
            (None, LockMode::Shared) => self.readers.contains(&tid) || self.waiting_writers == 0,
            (None, LockMode::Exclusive) => self.readers.iter().all(|&r| r == tid),
        }
    }

    fn is_free(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }
}

/// Pages a transaction holds, split by mode. A page is in at most one set.
#[derive(Debug, Default)]
struct TxnLocks {
    shared: HashSet<PageId>,
    exclusive: HashSet<PageId>,
}

impl TxnLocks {
    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_empty()
    }
}

#[derive(Debug, Default)]
struct LockTable {
    /// One entry per page ever requested; entries are never removed.
    pages: HashMap<PageId, PageLock>,
    txns: HashMap<TransactionId, TxnLocks>,
    /// Deadlock victims that have not yet completed.
    aborted: HashSet<TransactionId>,
}

impl LockTable {
    fn grant(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) {
        let Some(lock) = self.pages.get_mut(&pid) else {
            return;
        };
        let txn = self.txns.entry(tid).or_default();
        match mode {
            LockMode::Shared if lock.writer == Some(tid) => {}
            LockMode::Shared => {
                lock.readers.insert(tid);
                txn.shared.insert(pid);
            }
            LockMode::Exclusive => {
                lock.readers.remove(&tid);
                lock.writer = Some(tid);
                txn.shared.remove(&pid);
                txn.exclusive.insert(pid);
            }
        }
    }

    fn release_page_lock(&mut self, tid: TransactionId, pid: PageId) {
        if let Some(lock) = self.pages.get_mut(&pid) {
            lock.readers.remove(&tid);
            if lock.writer == Some(tid) {
                lock.writer = None;
            }
        }
    }
}

/// Grants shared/exclusive page locks and breaks deadlocks by timeout.
///
/// # Waiting
/// Blocked requests sleep on a condition variable that is signalled on
/// every release, bounded by the deadlock timeout.
///
/// # Starvation
/// Writer preference: while an exclusive request is waiting on a page, new
/// shared requests on that page wait too. Transactions that already hold
/// the page are never made to queue behind a writer.
///
/// # Deadlocks
/// When a request has waited longer than the timeout, every *other*
/// transaction holding any lock is marked aborted and handed back to the
/// caller as a victim. The waiter itself is never a victim, so at least one
/// transaction makes progress per timeout interval.
///
/// A victim stays marked until [`LockManager::complete`] is called for it;
/// [`LockManager::release_all`] alone keeps the mark. A victim that is never
/// completed keeps its entry for the life of the manager, so every
/// transaction must end in `complete`.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    /// Create a lock manager with the given deadlock timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// The deadlock timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire a `mode` lock on `pid` for `tid`, blocking until granted or
    /// until the deadlock timeout fires.
    ///
    /// Re-requesting a lock already held in the same or a stronger mode
    /// returns immediately. Requesting `Exclusive` while holding `Shared`
    /// upgrades once `tid` is the only reader.
    ///
    /// Creating the page's lock entry and granting happen under one mutex,
    /// so concurrent first requests for a page never race.
    ///
    /// # Errors
    /// `Error::TransactionAborted` if `tid` is (or becomes, while waiting) a
    /// deadlock victim.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<LockOutcome> {
        let mut table = self.table.lock();
        if table.aborted.contains(&tid) {
            return Err(Error::TransactionAborted(tid));
        }

        let lock = table.pages.entry(pid).or_default();
        if lock.can_grant(tid, mode) {
            table.grant(tid, pid, mode);
            trace!(%tid, %pid, ?mode, "lock granted");
            return Ok(LockOutcome::Granted);
        }
        if mode == LockMode::Exclusive {
            lock.waiting_writers += 1;
        }
        trace!(%tid, %pid, ?mode, "lock wait");

        let deadline = Instant::now() + self.timeout;
        loop {
            let timed_out = self.released.wait_until(&mut table, deadline).timed_out();

            if table.aborted.contains(&tid) {
                self.stop_waiting(&mut table, pid, mode);
                return Err(Error::TransactionAborted(tid));
            }

            let grantable = table
                .pages
                .get(&pid)
                .is_some_and(|lock| lock.can_grant(tid, mode));
            if grantable {
                self.stop_waiting(&mut table, pid, mode);
                table.grant(tid, pid, mode);
                trace!(%tid, %pid, ?mode, "lock granted after wait");
                return Ok(LockOutcome::Granted);
            }

            if timed_out || Instant::now() >= deadline {
                self.stop_waiting(&mut table, pid, mode);
                let victims: Vec<TransactionId> = table
                    .txns
                    .keys()
                    .copied()
                    .filter(|&other| other != tid && !table.aborted.contains(&other))
                    .collect();
                table.aborted.extend(victims.iter().copied());
                warn!(
                    waiter = %tid,
                    %pid,
                    victims = victims.len(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "deadlock timeout, aborting other lock holders"
                );
                // Victims blocked in their own waits must wake up and leave.
                self.released.notify_all();
                return Ok(LockOutcome::Deadlock { victims });
            }
        }
    }

    fn stop_waiting(&self, table: &mut LockTable, pid: PageId, mode: LockMode) {
        if mode != LockMode::Exclusive {
            return;
        }
        if let Some(lock) = table.pages.get_mut(&pid) {
            lock.waiting_writers -= 1;
            if lock.waiting_writers == 0 {
                // readers held back by writer preference may go now
                self.released.notify_all();
            }
        }
    }

    /// Release whatever lock `tid` holds on `pid`.
    ///
    /// # Errors
    /// `Error::PageNeverLocked` if no transaction ever requested `pid`.
    pub fn release(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        let mut table = self.table.lock();
        if !table.pages.contains_key(&pid) {
            return Err(Error::PageNeverLocked(pid));
        }
        table.release_page_lock(tid, pid);
        if let Some(txn) = table.txns.get_mut(&tid) {
            txn.shared.remove(&pid);
            txn.exclusive.remove(&pid);
            if txn.is_empty() {
                table.txns.remove(&tid);
            }
        }
        trace!(%tid, %pid, "lock released");
        self.released.notify_all();
        Ok(())
    }

    /// Release every lock `tid` holds. Returns the pages that were held.
    ///
    /// An aborted transaction stays marked aborted; see [`Self::complete`].
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let Some(txn) = table.txns.remove(&tid) else {
            return Vec::new();
        };
        let pages: Vec<PageId> = txn.shared.into_iter().chain(txn.exclusive).collect();
        for &pid in &pages {
            table.release_page_lock(tid, pid);
        }
        trace!(%tid, count = pages.len(), "all locks released");
        self.released.notify_all();
        pages
    }

    /// Release every lock and forget that `tid` was aborted.
    pub fn complete(&self, tid: TransactionId) -> Vec<PageId> {
        let pages = self.release_all(tid);
        self.table.lock().aborted.remove(&tid);
        pages
    }

    /// Whether `tid` holds any lock on `pid`.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held_mode(tid, pid).is_some()
    }

    /// Mode of the lock `tid` holds on `pid`, if any.
    pub fn held_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        let txn = table.txns.get(&tid)?;
        if txn.exclusive.contains(&pid) {
            Some(LockMode::Exclusive)
        } else if txn.shared.contains(&pid) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    /// Pages `tid` currently holds a lock on.
    pub fn pages_held(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        table
            .txns
            .get(&tid)
            .map(|txn| txn.shared.iter().chain(&txn.exclusive).copied().collect())
            .unwrap_or_default()
    }

    /// Whether `tid` was chosen as a deadlock victim and has not completed.
    pub fn is_aborted(&self, tid: TransactionId) -> bool {
        self.table.lock().aborted.contains(&tid)
    }

    /// Whether no transaction holds any lock on `pid`.
    pub fn is_free(&self, pid: PageId) -> bool {
        self.table.lock().pages.get(&pid).map_or(true, PageLock::is_free)
    }

    /// Number of pages with a lock entry (every page ever requested).
    pub fn lock_count(&self) -> usize {
        self.table.lock().pages.len()
    }
}
