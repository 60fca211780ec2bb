//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use heapcache::{
    BufferPool, BufferPoolConfig, Catalog, Field, HeapFile, PageId, TableId, Tuple, TupleDesc,
    Type,
};
use tempfile::TempDir;

pub struct TestDb {
    pub pool: Arc<BufferPool>,
    pub file: Arc<HeapFile>,
    pub desc: Arc<TupleDesc>,
    pub dir: TempDir,
}

impl TestDb {
    pub fn table(&self) -> TableId {
        self.file.table_id()
    }

    pub fn pid(&self, n: u32) -> PageId {
        PageId::new(self.table(), n)
    }

    pub fn row(&self, id: i32, name: &str) -> Tuple {
        row(&self.desc, id, name)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("people.dat")
    }
}

pub fn desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::with_names(&[Type::Int, Type::Text], &["id", "name"]))
}

pub fn row(desc: &Arc<TupleDesc>, id: i32, name: &str) -> Tuple {
    Tuple::new(Arc::clone(desc), vec![Field::Int(id), Field::Text(name.to_owned())]).unwrap()
}

/// Pool over one `(id INT, name STRING)` table that starts with
/// `file_pages` empty pages.
pub fn create_db(pool_pages: usize, file_pages: u32, timeout: Duration) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let desc = desc();
    let file = open_table(&dir.path().join("people.dat"), &desc);
    for _ in 0..file_pages {
        file.append_empty_page().unwrap();
    }

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::clone(&file), "people", "id");
    let config = BufferPoolConfig::default()
        .with_num_pages(pool_pages)
        .with_deadlock_timeout(timeout);

    TestDb {
        pool: Arc::new(BufferPool::with_config(config, catalog)),
        file,
        desc,
        dir,
    }
}

pub fn open_table(path: &Path, desc: &Arc<TupleDesc>) -> Arc<HeapFile> {
    Arc::new(HeapFile::open_or_create(path, Arc::clone(desc)).unwrap())
}

/// Raw bytes of every page in the file, straight from disk.
pub fn disk_bytes(file: &HeapFile) -> Vec<Vec<u8>> {
    (0..file.num_pages().unwrap())
        .map(|n| {
            file.read_page(PageId::new(file.table_id(), n))
                .unwrap()
                .to_bytes()
        })
        .collect()
}

/// Ids of every tuple on disk, sorted.
pub fn disk_ids(file: &HeapFile) -> Vec<i32> {
    let mut ids: Vec<i32> = (0..file.num_pages().unwrap())
        .flat_map(|n| {
            let page = file.read_page(PageId::new(file.table_id(), n)).unwrap();
            page.iter()
                .map(|t| match t.field(0) {
                    Some(Field::Int(id)) => *id,
                    other => panic!("unexpected field {:?}", other),
                })
                .collect::<Vec<_>>()
        })
        .collect();
    ids.sort_unstable();
    ids
}
