//! Tuple descriptor (schema of a table's rows).

use std::fmt;

use crate::tuple::Type;

/// One column of a [`TupleDesc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdItem {
    pub field_type: Type,
    pub field_name: Option<String>,
}

/// Ordered list of field types (and optional names) for a table.
///
/// Two descriptors are equal when their field types match position by
/// position; names are ignored.
#[derive(Debug, Clone)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    /// Descriptor with unnamed fields.
    ///
    /// # Panics
    /// Panics if `types` is empty.
    pub fn new(types: &[Type]) -> Self {
        assert!(!types.is_empty(), "tuple descriptor needs at least one field");
        Self {
            items: types
                .iter()
                .map(|&field_type| TdItem {
                    field_type,
                    field_name: None,
                })
                .collect(),
        }
    }

    /// Descriptor with named fields.
    ///
    /// # Panics
    /// Panics if `types` is empty or the slices differ in length.
    pub fn with_names(types: &[Type], names: &[&str]) -> Self {
        assert!(!types.is_empty(), "tuple descriptor needs at least one field");
        assert_eq!(types.len(), names.len(), "one name per field");
        Self {
            items: types
                .iter()
                .zip(names)
                .map(|(&field_type, name)| TdItem {
                    field_type,
                    field_name: Some((*name).to_owned()),
                })
                .collect(),
        }
    }

    /// Concatenate two descriptors.
    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        TupleDesc {
            items: a.items.iter().chain(&b.items).cloned().collect(),
        }
    }

    #[inline]
    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    /// Serialized size of one tuple in bytes.
    pub fn size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.field_name.as_deref())
    }

    /// Index of the first field called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.field_name.as_deref() == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TdItem> {
        self.items.iter()
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(&other.items)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({})",
                item.field_name.as_deref().unwrap_or("null"),
                item.field_type
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        let td = TupleDesc::new(&[Type::Int, Type::Int, Type::Text]);
        assert_eq!(td.num_fields(), 3);
        assert_eq!(td.size(), 4 + 4 + Type::Text.byte_len());
    }

    #[test]
    fn test_equality_ignores_names() {
        let a = TupleDesc::with_names(&[Type::Int, Type::Text], &["id", "name"]);
        let b = TupleDesc::new(&[Type::Int, Type::Text]);
        let c = TupleDesc::new(&[Type::Text, Type::Int]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_index_of() {
        let td = TupleDesc::with_names(&[Type::Int, Type::Text], &["id", "name"]);
        assert_eq!(td.index_of("name"), Some(1));
        assert_eq!(td.index_of("missing"), None);
        assert_eq!(td.field_name(0), Some("id"));
        assert_eq!(td.field_type(2), None);
    }

    #[test]
    fn test_merge() {
        let a = TupleDesc::with_names(&[Type::Int], &["a"]);
        let b = TupleDesc::with_names(&[Type::Text, Type::Int], &["b", "c"]);
        let merged = TupleDesc::merge(&a, &b);
        assert_eq!(merged.num_fields(), 3);
        assert_eq!(merged.index_of("c"), Some(2));
        assert_eq!(merged.size(), a.size() + b.size());
    }

    #[test]
    fn test_display() {
        let td = TupleDesc::with_names(&[Type::Int, Type::Text], &["id", "name"]);
        assert_eq!(format!("{}", td), "id(INT), name(STRING)");
    }
}
