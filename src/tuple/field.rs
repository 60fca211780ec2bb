//! Field types and values.

use std::fmt;

use crate::common::config::STRING_LEN;

/// Type of a tuple field.
///
/// Every type has a fixed serialized length, which is what makes the heap
/// page's fixed-size slots possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 32-bit signed integer.
    Int,
    /// Text of at most [`STRING_LEN`] bytes.
    Text,
}

impl Type {
    /// Serialized length in bytes.
    #[inline]
    pub const fn byte_len(self) -> usize {
        match self {
            Type::Int => 4,
            Type::Text => STRING_LEN + 4,
        }
    }

    /// Parse a type name as written in a schema file (`int` / `string`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" => Some(Type::Int),
            "string" => Some(Type::Text),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "INT"),
            Type::Text => write!(f, "STRING"),
        }
    }
}

/// A field value.
///
/// # On-disk layout
/// ```text
/// Int:   [i32 big-endian]                          4 bytes
/// Text:  [len: i32 big-endian][bytes][zero pad]    4 + STRING_LEN bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    /// Type of this value.
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Text(_) => Type::Text,
        }
    }

    /// Append the fixed-size encoding of this value to `out`.
    ///
    /// Text longer than [`STRING_LEN`] bytes is truncated at the last char
    /// boundary that fits.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Field::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Text(s) => {
                let mut end = s.len().min(STRING_LEN);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                let bytes = &s.as_bytes()[..end];
                out.extend_from_slice(&(end as i32).to_be_bytes());
                out.extend_from_slice(bytes);
                out.resize(out.len() + STRING_LEN - end, 0);
            }
        }
    }

    /// Decode a value of type `ty` from the front of `data`.
    pub fn parse(ty: Type, data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < ty.byte_len() {
            return Err("field truncated");
        }
        match ty {
            Type::Int => {
                let bytes = [data[0], data[1], data[2], data[3]];
                Ok(Field::Int(i32::from_be_bytes(bytes)))
            }
            Type::Text => {
                let len = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                if len < 0 || len as usize > STRING_LEN {
                    return Err("text length out of range");
                }
                let bytes = &data[4..4 + len as usize];
                let s = std::str::from_utf8(bytes).map_err(|_| "text is not valid UTF-8")?;
                Ok(Field::Text(s.to_owned()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}
