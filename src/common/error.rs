//! Error types for heapcache.

use thiserror::Error;

use crate::common::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapcache.
///
/// Concurrency and I/O errors propagate to the calling transaction. Nothing
/// here is retried automatically.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from heap file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page lies past the end of its heap file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Page bytes do not parse as a heap page.
    #[error("corrupt {page}: {reason}")]
    CorruptPage { page: PageId, reason: String },

    /// The transaction was chosen as a deadlock victim.
    ///
    /// The caller must unwind with `transaction_complete(tid, false)`.
    #[error("{0} aborted")]
    TransactionAborted(TransactionId),

    /// Cache is at capacity and every cached page is dirty.
    #[error("buffer pool full: all {capacity} cached pages are dirty")]
    BufferPoolFull { capacity: usize },

    /// No free slot on the page.
    #[error("{0} is full")]
    PageFull(PageId),

    /// Tuple layout does not match the table's tuple descriptor.
    #[error("tuple descriptor mismatch")]
    SchemaMismatch,

    /// Tuple has the wrong number of fields for its descriptor.
    #[error("expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    /// Tuple's record id points at a different page.
    #[error("tuple is not stored on {page}")]
    TupleNotOnPage { page: PageId },

    /// The tuple's slot holds no tuple.
    #[error("slot {slot} on {page} is already empty")]
    SlotEmpty { page: PageId, slot: usize },

    /// Tuple was never stored, or was already deleted.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// Release of a page the lock manager has never seen.
    ///
    /// This indicates a bug - releases should match acquisitions.
    #[error("{0} was never locked")]
    PageNeverLocked(PageId),

    #[error("no table with id {0}")]
    UnknownTable(TableId),

    #[error("no table named {0:?}")]
    UnknownTableName(String),

    /// Malformed line in a schema file.
    #[error("invalid catalog entry: {0}")]
    InvalidCatalog(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(TableId(1), 42));
        assert_eq!(format!("{}", err), "Page(1:42) not found");

        let err = Error::BufferPoolFull { capacity: 2 };
        assert_eq!(
            format!("{}", err),
            "buffer pool full: all 2 cached pages are dirty"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }
}
