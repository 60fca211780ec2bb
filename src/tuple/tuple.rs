//! Tuples and record ids.

use std::fmt;
use std::sync::Arc;

use crate::common::{Error, PageId, Result};
use crate::tuple::{Field, TupleDesc};

/// Location of a stored tuple: a slot on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    #[inline]
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

/// A row: field values laid out per a [`TupleDesc`].
///
/// A tuple carries a [`RecordId`] once it has been placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Build a tuple, checking field count and types against `desc`.
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != desc.num_fields() {
            return Err(Error::FieldCount {
                expected: desc.num_fields(),
                actual: fields.len(),
            });
        }
        let types_match = fields
            .iter()
            .enumerate()
            .all(|(i, f)| desc.field_type(i) == Some(f.field_type()));
        if !types_match {
            return Err(Error::SchemaMismatch);
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }

    #[inline]
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    /// Replace field `i`; the value must have the column's type.
    pub fn set_field(&mut self, i: usize, field: Field) -> Result<()> {
        match self.desc.field_type(i) {
            Some(ty) if ty == field.field_type() => {
                self.fields[i] = field;
                Ok(())
            }
            _ => Err(Error::SchemaMismatch),
        }
    }

    #[inline]
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    #[inline]
    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Append the slot encoding of this tuple (fields in order) to `out`.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            field.serialize(out);
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
