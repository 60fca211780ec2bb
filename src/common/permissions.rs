//! Page access permissions.

use crate::concurrency::LockMode;

/// Access a transaction requests when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Shared access; takes a read lock.
    ReadOnly,
    /// Exclusive access; takes a write lock.
    ReadWrite,
}

impl Permissions {
    /// The lock mode this permission requires.
    #[inline]
    pub fn lock_mode(self) -> LockMode {
        match self {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}
