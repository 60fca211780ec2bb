//! Catalog - table ids to schemas and heap files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::common::{Error, Result, TableId};
use crate::storage::HeapFile;
use crate::tuple::{TupleDesc, Type};

#[derive(Debug)]
struct Table {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

#[derive(Debug, Default)]
struct Tables {
    by_id: HashMap<TableId, Table>,
    by_name: HashMap<String, TableId>,
}

/// Registry of the tables a buffer pool can load pages from.
///
/// # Thread Safety
/// Lookups take a shared `RwLock`; only `add_table`, `clear` and
/// `load_schema` write.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<Tables>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`. A table already registered with the
    /// same name or the same id is replaced.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) -> TableId {
        let id = file.table_id();
        let mut tables = self.tables.write();

        if let Some(old_id) = tables.by_name.remove(name) {
            tables.by_id.remove(&old_id);
        }
        if let Some(old) = tables.by_id.remove(&id) {
            tables.by_name.remove(&old.name);
        }

        tables.by_name.insert(name.to_owned(), id);
        tables.by_id.insert(
            id,
            Table {
                file,
                name: name.to_owned(),
                primary_key: primary_key.to_owned(),
            },
        );
        debug!(table = name, %id, "added table");
        id
    }

    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTableName(name.to_owned()))
    }

    pub fn file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        self.with_table(id, |table| Arc::clone(&table.file))
    }

    pub fn tuple_desc(&self, id: TableId) -> Result<Arc<TupleDesc>> {
        self.with_table(id, |table| Arc::clone(table.file.desc()))
    }

    pub fn table_name(&self, id: TableId) -> Result<String> {
        self.with_table(id, |table| table.name.clone())
    }

    /// Primary key field name; empty if the table has none.
    pub fn primary_key(&self, id: TableId) -> Result<String> {
        self.with_table(id, |table| table.primary_key.clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().by_id.keys().copied().collect()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.by_id.clear();
        tables.by_name.clear();
    }

    fn with_table<T>(&self, id: TableId, f: impl FnOnce(&Table) -> T) -> Result<T> {
        self.tables
            .read()
            .by_id
            .get(&id)
            .map(f)
            .ok_or(Error::UnknownTable(id))
    }

    /// Register every table described in a schema file.
    ///
    /// Each non-blank line reads `name (field type [pk], ...)` with types
    /// `int` or `string`. Table `name` is stored in `name.dat` next to the
    /// schema file, created empty if missing.
    ///
    /// # Errors
    /// `Error::InvalidCatalog` for a malformed line, plus I/O errors.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> Result<Vec<TableId>> {
        let path = path.as_ref();
        let dir = path
            .canonicalize()?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let text = fs::read_to_string(path)?;

        let mut ids = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let entry = parse_schema_line(line)?;
            let data_path = dir.join(format!("{}.dat", entry.name));
            let file = HeapFile::open_or_create(data_path, Arc::new(entry.desc))?;
            ids.push(self.add_table(Arc::new(file), &entry.name, &entry.primary_key));
        }
        Ok(ids)
    }
}

struct SchemaEntry {
    name: String,
    desc: TupleDesc,
    primary_key: String,
}

fn parse_schema_line(line: &str) -> Result<SchemaEntry> {
    let invalid = |why: &str| Error::InvalidCatalog(format!("{}: {:?}", why, line));

    let (open, close) = match (line.find('('), line.rfind(')')) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return Err(invalid("expected name (field type, ...)")),
    };
    let name = line[..open].trim();
    if name.is_empty() {
        return Err(invalid("missing table name"));
    }

    let mut types = Vec::new();
    let mut names = Vec::new();
    let mut primary_key = String::new();
    for column in line[open + 1..close].split(',') {
        let parts: Vec<&str> = column.split_whitespace().collect();
        let (field, ty, pk) = match parts.as_slice() {
            [field, ty] => (*field, *ty, false),
            [field, ty, "pk"] => (*field, *ty, true),
            [_, _, other] => return Err(invalid(&format!("unknown annotation {}", other))),
            _ => return Err(invalid("expected field type")),
        };
        types.push(Type::from_name(ty).ok_or_else(|| invalid(&format!("unknown type {}", ty)))?);
        names.push(field);
        if pk {
            primary_key = field.to_owned();
        }
    }

    Ok(SchemaEntry {
        name: name.to_owned(),
        desc: TupleDesc::with_names(&types, &names),
        primary_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table(dir: &Path, file_name: &str) -> Arc<HeapFile> {
        let desc = Arc::new(TupleDesc::new(&[Type::Int]));
        Arc::new(HeapFile::create(dir.join(file_name), desc).unwrap())
    }

    #[test]
    fn test_add_and_lookup() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();

        let id = catalog.add_table(table(dir.path(), "a.dat"), "a", "x");
        assert_eq!(catalog.table_id("a").unwrap(), id);
        assert_eq!(catalog.table_name(id).unwrap(), "a");
        assert_eq!(catalog.primary_key(id).unwrap(), "x");
        assert_eq!(catalog.tuple_desc(id).unwrap().num_fields(), 1);
        assert_eq!(catalog.table_ids(), vec![id]);
    }

    #[test]
    fn test_unknown_lookups() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.table_id("nope"), Err(Error::UnknownTableName(_))));
        assert!(matches!(catalog.file(TableId(1)), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn test_name_conflict_replaces_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();

        let first = catalog.add_table(table(dir.path(), "a.dat"), "t", "");
        let second = catalog.add_table(table(dir.path(), "b.dat"), "t", "");

        assert_ne!(first, second);
        assert_eq!(catalog.table_id("t").unwrap(), second);
        assert!(catalog.file(first).is_err());
        assert_eq!(catalog.table_ids().len(), 1);
    }

    #[test]
    fn test_id_conflict_replaces_name() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let file = table(dir.path(), "a.dat");

        let id = catalog.add_table(Arc::clone(&file), "old", "");
        catalog.add_table(file, "new", "");

        assert!(catalog.table_id("old").is_err());
        assert_eq!(catalog.table_id("new").unwrap(), id);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        catalog.add_table(table(dir.path(), "a.dat"), "a", "");

        catalog.clear();
        assert!(catalog.table_ids().is_empty());
        assert!(catalog.table_id("a").is_err());
    }

    #[test]
    fn test_load_schema() {
        let dir = tempdir().unwrap();
        let schema = dir.path().join("schema.txt");
        fs::write(&schema, "users (id int pk, name string)\n\norders (id int, user int)\n").unwrap();

        let catalog = Catalog::new();
        let ids = catalog.load_schema(&schema).unwrap();
        assert_eq!(ids.len(), 2);

        let users = catalog.table_id("users").unwrap();
        assert_eq!(catalog.primary_key(users).unwrap(), "id");
        let desc = catalog.tuple_desc(users).unwrap();
        assert_eq!(desc.field_type(1), Some(Type::Text));
        assert_eq!(desc.field_name(1), Some("name"));
        assert!(dir.path().join("users.dat").exists());
        assert!(dir.path().join("orders.dat").exists());
    }

    #[test]
    fn test_load_schema_rejects_bad_lines() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();

        for bad in ["users id int", "(id int)", "t (id float)", "t (id int key)", "t (id)"] {
            let schema = dir.path().join("schema.txt");
            fs::write(&schema, bad).unwrap();
            let result = catalog.load_schema(&schema);
            assert!(matches!(result, Err(Error::InvalidCatalog(_))), "{}", bad);
        }
    }
}
