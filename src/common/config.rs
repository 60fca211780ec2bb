//! Configuration constants for heapcache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Default size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems. The page size is process-wide
/// and must stay fixed for the lifetime of any heap file's data: every
/// page offset in a file is `page_number * page_size()`.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages a [`BufferPool`](crate::BufferPool) caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// How long a lock request may wait before the lock manager declares a
/// deadlock and aborts the other lock holders.
pub const DEFAULT_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(150);

/// Maximum number of bytes stored for a text field.
pub const STRING_LEN: usize = 128;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current process-wide page size.
#[inline]
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Change the process-wide page size.
///
/// Only safe before any heap file is read or written with the old size.
pub fn set_page_size(size: usize) {
    assert!(size > 0, "page size must be > 0");
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

/// Restore the page size to [`DEFAULT_PAGE_SIZE`].
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_size_is_power_of_two() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert_eq!(DEFAULT_PAGE_SIZE, 4096);
    }

    #[test]
    fn test_deadlock_timeout() {
        assert_eq!(DEFAULT_DEADLOCK_TIMEOUT.as_millis(), 150);
    }
}
