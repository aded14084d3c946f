//! Schema descriptor for fixed-width heap tuples.

use serde::{Deserialize, Serialize};
use slate_common::{FieldType, Result, SlateError};
use std::hash::{Hash, Hasher};

/// One column of a schema: its type and optional name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub field_type: FieldType,
    pub name: Option<String>,
}

/// Ordered, immutable list of typed (and optionally named) fields.
///
/// Equality and hashing consider field types only; names are labels.
/// Serialized as the plain list of fields; deserializing applies the same
/// checks as the constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "Vec<SchemaField>", try_from = "Vec<SchemaField>")]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    /// Creates a schema from parallel type and name sequences.
    pub fn new(types: Vec<FieldType>, names: Vec<Option<String>>) -> Result<Self> {
        if types.len() != names.len() {
            return Err(SlateError::InvalidSchema(format!(
                "{} types but {} names",
                types.len(),
                names.len()
            )));
        }
        let fields = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| SchemaField { field_type, name })
            .collect();
        Self::from_fields(fields)
    }

    /// Creates a schema with anonymous fields.
    pub fn from_types(types: Vec<FieldType>) -> Result<Self> {
        let names = vec![None; types.len()];
        Self::new(types, names)
    }

    /// Creates a schema from `(type, name)` pairs.
    pub fn named<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (FieldType, S)>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(field_type, name)| SchemaField {
                field_type,
                name: Some(name.into()),
            })
            .collect();
        Self::from_fields(fields)
    }

    fn from_fields(fields: Vec<SchemaField>) -> Result<Self> {
        if fields.is_empty() {
            return Err(SlateError::InvalidSchema(
                "schema must have at least one field".to_string(),
            ));
        }
        for field in &fields {
            if let FieldType::Text { capacity } = field.field_type {
                if capacity > i32::MAX as u32 {
                    return Err(SlateError::InvalidSchema(format!(
                        "text capacity {} exceeds {}",
                        capacity,
                        i32::MAX
                    )));
                }
            }
        }
        Ok(Self { fields })
    }

    /// Concatenates two schemas, `a`'s fields first.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let mut fields = Vec::with_capacity(a.fields.len() + b.fields.len());
        fields.extend(a.fields.iter().cloned());
        fields.extend(b.fields.iter().cloned());
        Schema { fields }
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns the name of field `i`, `None` for an anonymous field.
    pub fn field_name(&self, i: usize) -> Result<Option<&str>> {
        self.field(i).map(|f| f.name.as_deref())
    }

    /// Returns the type of field `i`.
    pub fn field_type(&self, i: usize) -> Result<FieldType> {
        self.field(i).map(|f| f.field_type)
    }

    fn field(&self, i: usize) -> Result<&SchemaField> {
        self.fields.get(i).ok_or(SlateError::IndexOutOfRange {
            index: i,
            len: self.fields.len(),
        })
    }

    /// Returns the index of the first field called `name`.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| SlateError::FieldNotFound(name.to_string()))
    }

    /// Serialized width of a tuple with this schema.
    pub fn byte_width(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.fixed_size()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaField> {
        self.fields.iter()
    }
}

impl TryFrom<Vec<SchemaField>> for Schema {
    type Error = SlateError;

    fn try_from(fields: Vec<SchemaField>) -> Result<Self> {
        Self::from_fields(fields)
    }
}

impl From<Schema> for Vec<SchemaField> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.len().hash(state);
        for field in &self.fields {
            field.field_type.hash(state);
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a SchemaField;
    type IntoIter = std::slice::Iter<'a, SchemaField>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{}({})",
                field.field_type,
                field.name.as_deref().unwrap_or("null")
            )?;
        }
        Ok(())
    }
}
