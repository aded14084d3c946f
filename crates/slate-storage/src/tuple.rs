//! Tuple representation and serialization.

use crate::field::Field;
use crate::schema::Schema;
use bytes::{Buf, BufMut};
use slate_common::page::PageId;
use slate_common::{Result, SlateError};
use std::sync::Arc;

/// Location of a tuple: the page holding it and its slot on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing this tuple.
    pub page_id: PageId,
    /// Slot number within the page.
    pub slot: u16,
}

impl RecordId {
    /// Creates a new record ID.
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.page_id, self.slot)
    }
}

/// A row: one value per schema field, plus its location once stored.
///
/// Field values always agree with the schema's types; constructors and
/// setters reject anything else.
#[derive(Debug, Clone)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple with no record ID.
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != schema.num_fields() {
            return Err(SlateError::SchemaMismatch {
                expected: schema.to_string(),
                actual: format!("{} values", fields.len()),
            });
        }
        for (field, column) in fields.iter().zip(schema.iter()) {
            if !field.is_compatible_with(&column.field_type) {
                return Err(SlateError::SchemaMismatch {
                    expected: schema.to_string(),
                    actual: Self::render(&fields),
                });
            }
        }
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns field `i`.
    pub fn field(&self, i: usize) -> Result<&Field> {
        self.fields.get(i).ok_or(SlateError::IndexOutOfRange {
            index: i,
            len: self.fields.len(),
        })
    }

    /// Replaces field `i`.
    pub fn set_field(&mut self, i: usize, value: Field) -> Result<()> {
        let field_type = self.schema.field_type(i)?;
        if !value.is_compatible_with(&field_type) {
            return Err(SlateError::SchemaMismatch {
                expected: field_type.to_string(),
                actual: value.to_string(),
            });
        }
        self.fields[i] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Writes every field in schema order, `schema.byte_width()` bytes in total.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        for (field, column) in self.fields.iter().zip(self.schema.iter()) {
            field.encode(&column.field_type, buf)?;
        }
        Ok(())
    }

    /// Reads one tuple of `schema` from `buf`.
    pub fn deserialize<B: Buf>(schema: Arc<Schema>, buf: &mut B) -> Result<Self> {
        let fields = schema
            .iter()
            .map(|column| Field::decode(&column.field_type, buf))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    fn render(fields: &[Field]) -> String {
        fields
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// Tuples are equal when their schemas and values are; location is ignored.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.fields == other.fields
    }
}

impl Eq for Tuple {}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Self::render(&self.fields))
    }
}
