//! Table and page identifier types.

use std::fmt;

/// Identifies a table (and the heap file backing it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(id: u32) -> Self {
        TableId(id)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page of a table on disk.
///
/// A page lives at file offset `page_number * page_size()` in the heap file
/// of `table_id`. Used as the key of the page cache and the lock table.
///
/// # Example
/// ```
/// use heapcache::{PageId, TableId};
///
/// let pid = PageId::new(TableId(7), 3);
/// assert_eq!(pid.table_id(), TableId(7));
/// assert_eq!(pid.page_number(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_number: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn page_number(&self) -> u32 {
        self.page_number
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(TableId(1), 42);
        assert_eq!(pid.table_id(), TableId(1));
        assert_eq!(pid.page_number(), 42);
    }

    #[test]
    fn test_page_id_hash_key() {
        let mut set = HashSet::new();
        set.insert(PageId::new(TableId(1), 0));
        set.insert(PageId::new(TableId(1), 0));
        set.insert(PageId::new(TableId(2), 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(TableId(1), 1) < PageId::new(TableId(1), 2));
        assert!(PageId::new(TableId(1), 9) < PageId::new(TableId(2), 0));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(TableId(3), 42)), "Page(3:42)");
        assert_eq!(format!("{}", TableId(3)), "Table(3)");
    }
}
