//! Field types supported by heap tuples.

use serde::{Deserialize, Serialize};

/// Serialized width of an INT field in bytes.
pub const INT_SIZE: usize = 4;

/// Serialized width of the length prefix of a TEXT field in bytes.
pub const TEXT_LENGTH_PREFIX: usize = 4;

/// Capacity used by [`FieldType::text`] when none is given.
pub const DEFAULT_TEXT_CAPACITY: u32 = 128;

/// Type of a single tuple field.
///
/// Every type has a fixed serialized width, so a schema built from these
/// types always describes fixed-width tuples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int,
    /// Length-prefixed text holding at most `capacity` bytes.
    Text { capacity: u32 },
}

impl FieldType {
    /// Returns a TEXT type with the default capacity.
    pub fn text() -> Self {
        FieldType::Text {
            capacity: DEFAULT_TEXT_CAPACITY,
        }
    }

    /// Returns a TEXT type with the given capacity.
    pub fn text_with_capacity(capacity: u32) -> Self {
        FieldType::Text { capacity }
    }

    /// Returns the serialized width of this type in bytes.
    pub fn fixed_size(&self) -> usize {
        match self {
            FieldType::Int => INT_SIZE,
            FieldType::Text { capacity } => TEXT_LENGTH_PREFIX + *capacity as usize,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Text { capacity } => write!(f, "TEXT({})", capacity),
        }
    }
}
