//! Heap file - an unordered table stored as a sequence of heap pages.
//!
//! The [`HeapFile`] handles direct file operations for one table:
//! - Reading and writing whole pages at `page_number * page_size`
//! - Growing the file by one empty page
//! - Placing and removing tuples through the buffer pool

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::config::page_size;
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::page::HeapPage;
use crate::tuple::{Tuple, TupleDesc};

/// One table on disk.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0   1×size    2×size   ...     N×size
/// ```
/// There is no file header; the page count is the file length divided by
/// the page size.
///
/// # Thread Safety
/// All I/O goes through one mutex around the file handle, which also
/// serializes file extension so two appenders never claim the same page
/// number.
///
/// # Durability
/// Every write is followed by `fsync()`. Commit relies on this to force a
/// transaction's pages to disk before its locks are released.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    file: Mutex<File>,
    table_id: TableId,
    desc: Arc<TupleDesc>,
}

impl HeapFile {
    /// Create a new, empty heap file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::from_file(path.as_ref(), file, desc)
    }

    /// Open an existing heap file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Self::from_file(path.as_ref(), file, desc)
    }

    /// Open an existing heap file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, desc)
        } else {
            Self::create(path, desc)
        }
    }

    fn from_file(path: &Path, file: File, desc: Arc<TupleDesc>) -> Result<Self> {
        let path = path.canonicalize()?;
        let table_id = TableId(crc32fast::hash(path.to_string_lossy().as_bytes()));
        Ok(Self {
            path,
            file: Mutex::new(file),
            table_id,
            desc,
        })
    }

    /// Identifier of this table, stable across reopening the same path.
    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file.
    pub fn num_pages(&self) -> Result<u32> {
        let file = self.file.lock();
        Self::page_count(&file)
    }

    fn page_count(file: &File) -> Result<u32> {
        Ok((file.metadata()?.len() / page_size() as u64) as u32)
    }

    fn offset(page_number: u32) -> u64 {
        page_number as u64 * page_size() as u64
    }

    /// Read and decode a page from disk.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page belongs to another table or lies
    ///   past the end of the file
    /// - `Error::CorruptPage` if the bytes don't decode under this table's schema
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        let mut data = vec![0u8; page_size()];
        {
            let mut file = self.file.lock();
            if pid.table_id() != self.table_id || pid.page_number() >= Self::page_count(&file)? {
                return Err(Error::PageNotFound(pid));
            }
            file.seek(SeekFrom::Start(Self::offset(pid.page_number())))?;
            file.read_exact(&mut data)?;
        }
        HeapPage::from_bytes(pid, Arc::clone(&self.desc), &data)
    }

    /// Write a page to its slot in the file and `fsync()`.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been appended yet.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let pid = page.id();
        let data = page.to_bytes();

        let mut file = self.file.lock();
        if pid.table_id() != self.table_id || pid.page_number() >= Self::page_count(&file)? {
            return Err(Error::PageNotFound(pid));
        }
        file.seek(SeekFrom::Start(Self::offset(pid.page_number())))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Grow the file by one zero-filled page and return its id.
    ///
    /// Only the empty page reaches disk; tuples placed on it stay in the
    /// buffer pool until their transaction commits.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_number = Self::page_count(&file)?;
        file.seek(SeekFrom::Start(Self::offset(page_number)))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.sync_all()?;

        let pid = PageId::new(self.table_id, page_number);
        debug!(%pid, "appended empty page");
        Ok(pid)
    }

    /// Place `tuple` on the first page with a free slot, appending a page
    /// if every existing one is full. Returns the modified page copy.
    ///
    /// Each visited page is write-locked through `pool`. A full page whose
    /// lock `tid` did not already hold is released again right away.
    ///
    /// # Errors
    /// `Error::SchemaMismatch` if the tuple doesn't match this table, plus
    /// anything [`BufferPool::get_page`] can return.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<HeapPage>> {
        if **tuple.desc() != *self.desc {
            return Err(Error::SchemaMismatch);
        }

        let mut next = 0;
        loop {
            let num_pages = self.num_pages()?;
            while next < num_pages {
                let pid = PageId::new(self.table_id, next);
                next += 1;

                let held = pool.holds_lock(tid, pid);
                let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                if page.num_empty_slots() == 0 {
                    if !held {
                        pool.release_page(tid, pid)?;
                    }
                    continue;
                }

                let mut copy = HeapPage::clone(&page);
                copy.insert_tuple(tuple)?;
                return Ok(vec![copy]);
            }
            // Another appender may race us; the new page is picked up by
            // the next scan either way.
            self.append_empty_page()?;
        }
    }

    /// Remove `tuple` from the page its record id names. Returns the
    /// modified page copy.
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::TupleNotOnPage` if the record id names another table
    /// - `Error::SlotEmpty` if the slot is already empty
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<HeapPage>> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if rid.page_id.table_id() != self.table_id {
            return Err(Error::TupleNotOnPage { page: rid.page_id });
        }

        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        let mut copy = HeapPage::clone(&page);
        copy.delete_tuple(tuple)?;
        Ok(vec![copy])
    }

    /// Sequential scan of every tuple, read-locking each page through `pool`.
    pub fn iter<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> Result<HeapFileIter<'a>> {
        Ok(HeapFileIter {
            file: self,
            pool,
            tid,
            num_pages: self.num_pages()?,
            next_page: 0,
            current: None,
            slot: 0,
        })
    }
}

/// Iterator over the tuples of a [`HeapFile`], page by page.
///
/// The page count is fixed when the iterator is created. An error from the
/// pool is yielded once and ends the scan.
pub struct HeapFileIter<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    num_pages: u32,
    next_page: u32,
    current: Option<Arc<HeapPage>>,
    slot: usize,
}

impl HeapFileIter<'_> {
    /// Restart the scan from the first page.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.current = None;
        self.slot = 0;
    }
}

impl Iterator for HeapFileIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(page) = &self.current {
                while self.slot < page.num_slots() {
                    let slot = self.slot;
                    self.slot += 1;
                    if let Some(tuple) = page.tuple(slot) {
                        return Some(Ok(tuple.clone()));
                    }
                }
                self.current = None;
            }

            if self.next_page >= self.num_pages {
                return None;
            }
            let pid = PageId::new(self.file.table_id, self.next_page);
            self.next_page += 1;

            match self.pool.get_page(self.tid, pid, Permissions::ReadOnly) {
                Ok(page) => {
                    self.current = Some(page);
                    self.slot = 0;
                }
                Err(e) => {
                    self.next_page = self.num_pages;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::tuple::{Field, Type};
    use tempfile::tempdir;

    fn int_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::new(&[Type::Int, Type::Int]))
    }

    fn row(desc: &Arc<TupleDesc>, a: i32, b: i32) -> Tuple {
        Tuple::new(Arc::clone(desc), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let file = HeapFile::create(dir.path().join("t.dat"), int_desc()).unwrap();
        assert_eq!(file.num_pages().unwrap(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        HeapFile::create(&path, int_desc()).unwrap();
        assert!(HeapFile::create(&path, int_desc()).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(HeapFile::open(dir.path().join("missing.dat"), int_desc()).is_err());
    }

    #[test]
    fn test_table_id_stable_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        let first = HeapFile::create(&path, int_desc()).unwrap().table_id();
        let second = HeapFile::open(&path, int_desc()).unwrap().table_id();
        let other = HeapFile::create(dir.path().join("u.dat"), int_desc())
            .unwrap()
            .table_id();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_append_and_read_empty_page() {
        let dir = tempdir().unwrap();
        let file = HeapFile::create(dir.path().join("t.dat"), int_desc()).unwrap();

        let pid = file.append_empty_page().unwrap();
        assert_eq!(pid.page_number(), 0);
        assert_eq!(file.num_pages().unwrap(), 1);

        let page = file.read_page(pid).unwrap();
        assert_eq!(page.num_empty_slots(), page.num_slots());
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let desc = int_desc();
        let file = HeapFile::create(dir.path().join("t.dat"), Arc::clone(&desc)).unwrap();
        let pid = file.append_empty_page().unwrap();

        let mut page = file.read_page(pid).unwrap();
        let mut t = row(&desc, 7, 8);
        page.insert_tuple(&mut t).unwrap();
        file.write_page(&page).unwrap();

        let read_back = file.read_page(pid).unwrap();
        assert_eq!(read_back.to_bytes(), page.to_bytes());
        assert_eq!(read_back.tuple(0).unwrap().field(0), Some(&Field::Int(7)));
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let desc = int_desc();

        {
            let file = HeapFile::create(&path, Arc::clone(&desc)).unwrap();
            let pid = file.append_empty_page().unwrap();
            let mut page = file.read_page(pid).unwrap();
            page.insert_tuple(&mut row(&desc, 42, 0)).unwrap();
            file.write_page(&page).unwrap();
        }

        {
            let file = HeapFile::open(&path, Arc::clone(&desc)).unwrap();
            assert_eq!(file.num_pages().unwrap(), 1);
            let page = file.read_page(PageId::new(file.table_id(), 0)).unwrap();
            assert_eq!(page.iter().count(), 1);
        }
    }

    #[test]
    fn test_read_past_end() {
        let dir = tempdir().unwrap();
        let file = HeapFile::create(dir.path().join("t.dat"), int_desc()).unwrap();
        file.append_empty_page().unwrap();

        let result = file.read_page(PageId::new(file.table_id(), 1));
        assert!(matches!(result, Err(Error::PageNotFound(_))));
    }

    #[test]
    fn test_write_unappended_page() {
        let dir = tempdir().unwrap();
        let file = HeapFile::create(dir.path().join("t.dat"), int_desc()).unwrap();

        let page = HeapPage::empty(PageId::new(file.table_id(), 0), int_desc());
        assert!(matches!(file.write_page(&page), Err(Error::PageNotFound(_))));
    }

    #[test]
    fn test_insert_appends_page_without_writing_tuple() {
        let dir = tempdir().unwrap();
        let desc = int_desc();
        let file = Arc::new(HeapFile::create(dir.path().join("t.dat"), Arc::clone(&desc)).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file), "t", "");
        let pool = BufferPool::new(4, catalog);

        let tid = TransactionId::new();
        let mut t = row(&desc, 1, 2);
        let pages = file.insert_tuple(&pool, tid, &mut t).unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(file.num_pages().unwrap(), 1);
        assert_eq!(t.record_id().unwrap().page_id, pages[0].id());
        // the new page on disk is still empty
        let on_disk = file.read_page(pages[0].id()).unwrap();
        assert_eq!(on_disk.iter().count(), 0);
    }

    #[test]
    fn test_delete_requires_record_id() {
        let dir = tempdir().unwrap();
        let desc = int_desc();
        let file = Arc::new(HeapFile::create(dir.path().join("t.dat"), Arc::clone(&desc)).unwrap());
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file), "t", "");
        let pool = BufferPool::new(4, catalog);

        let mut t = row(&desc, 1, 2);
        let result = file.delete_tuple(&pool, TransactionId::new(), &mut t);
        assert!(matches!(result, Err(Error::MissingRecordId)));
    }

    #[test]
    fn test_iter_scans_all_pages() {
        let dir = tempdir().unwrap();
        let desc = int_desc();
        let path = dir.path().join("t.dat");
        let file = HeapFile::create(&path, Arc::clone(&desc)).unwrap();

        // two pages on disk with one tuple each
        for i in 0..2 {
            let pid = file.append_empty_page().unwrap();
            let mut page = file.read_page(pid).unwrap();
            page.insert_tuple(&mut row(&desc, i, i * 10)).unwrap();
            file.write_page(&page).unwrap();
        }

        let file = Arc::new(file);
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file), "t", "");
        let pool = BufferPool::new(4, catalog);

        let tid = TransactionId::new();
        let mut iter = file.iter(&pool, tid).unwrap();
        let firsts: Vec<Field> = iter
            .by_ref()
            .map(|t| t.unwrap().field(0).cloned().unwrap())
            .collect();
        assert_eq!(firsts, vec![Field::Int(0), Field::Int(1)]);

        iter.rewind();
        assert_eq!(iter.count(), 2);
        assert!(pool.holds_lock(tid, PageId::new(file.table_id(), 1)));
    }
}
