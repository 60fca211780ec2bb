//! Schema and tuple model.
//!
//! The storage layer only needs a tuple's serialized size and field
//! boundaries to lay out pages:
//! - [`Type`] / [`Field`] - Fixed-length field types and tagged values
//! - [`TupleDesc`] - Ordered field types of a table
//! - [`Tuple`] / [`RecordId`] - A row and where it is stored

mod field;
#[allow(clippy::module_inception)]
mod tuple;
mod tuple_desc;

pub use field::{Field, Type};
pub use tuple::{RecordId, Tuple};
pub use tuple_desc::{TdItem, TupleDesc};
