//! Field values and their fixed-width binary encoding.
//!
//! Encoding (big-endian):
//! ```text
//! INT:        | value: i32 (4) |
//! TEXT(cap):  | length: i32 (4) | content (length) | zero fill (cap - length) |
//! ```

use bytes::{Buf, BufMut};
use slate_common::types::FieldType;
use slate_common::{Result, SlateError};

/// A single field value of a tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    /// Returns true if this value can be stored in a field of `field_type`.
    ///
    /// Text of any length is compatible with any TEXT capacity; it is
    /// truncated on encode.
    pub fn is_compatible_with(&self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (Field::Int(_), FieldType::Int) | (Field::Text(_), FieldType::Text { .. })
        )
    }

    /// Returns the integer value, if this is an INT field.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Text(_) => None,
        }
    }

    /// Returns the text value, if this is a TEXT field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            Field::Int(_) => None,
        }
    }

    /// Writes this value as `field_type`, consuming exactly
    /// `field_type.fixed_size()` bytes of `buf`.
    pub fn encode<B: BufMut>(&self, field_type: &FieldType, buf: &mut B) -> Result<()> {
        match (self, field_type) {
            (Field::Int(v), FieldType::Int) => {
                buf.put_i32(*v);
            }
            (Field::Text(s), FieldType::Text { capacity }) => {
                let capacity = *capacity as usize;
                let content = truncate_at_char_boundary(s, capacity);
                buf.put_i32(content.len() as i32);
                buf.put_slice(content.as_bytes());
                buf.put_bytes(0, capacity - content.len());
            }
            _ => {
                return Err(SlateError::SchemaMismatch {
                    expected: field_type.to_string(),
                    actual: self.type_name().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Reads one value of `field_type`, advancing `buf` by exactly its fixed width.
    pub fn decode<B: Buf>(field_type: &FieldType, buf: &mut B) -> Result<Field> {
        let width = field_type.fixed_size();
        if buf.remaining() < width {
            return Err(SlateError::MalformedField(format!(
                "{} needs {} bytes, {} remaining",
                field_type,
                width,
                buf.remaining()
            )));
        }

        match field_type {
            FieldType::Int => Ok(Field::Int(buf.get_i32())),
            FieldType::Text { capacity } => {
                let length = buf.get_i32();
                let mut content = vec![0u8; *capacity as usize];
                buf.copy_to_slice(&mut content);

                if length < 0 || length as u32 > *capacity {
                    return Err(SlateError::MalformedField(format!(
                        "text length {} outside 0..={}",
                        length, capacity
                    )));
                }
                content.truncate(length as usize);
                String::from_utf8(content)
                    .map(Field::Text)
                    .map_err(|e| SlateError::MalformedField(format!("invalid utf-8: {}", e)))
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Field::Int(_) => "INT",
            Field::Text(_) => "TEXT",
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Int(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "{}", s),
        }
    }
}
