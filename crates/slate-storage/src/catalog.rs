//! Table registry mapping table ids and names to heap files and schemas.

use crate::heap::HeapFile;
use crate::schema::Schema;
use parking_lot::RwLock;
use slate_common::{Result, SlateError};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves the schema of a table from its id.
pub trait SchemaLookup: Send + Sync {
    fn schema_of(&self, table_id: u32) -> Result<Arc<Schema>>;
}

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<u32, TableEntry>,
    names: HashMap<String, u32>,
}

/// Registry of the tables known to the storage layer.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`.
    ///
    /// A table already registered under `name`, or with the same file id,
    /// is replaced.
    pub fn add_table(
        &self,
        file: Arc<HeapFile>,
        name: impl Into<String>,
        primary_key: impl Into<String>,
    ) {
        let name = name.into();
        let table_id = file.id();
        let mut inner = self.inner.write();

        if let Some(old_id) = inner.names.remove(&name) {
            inner.tables.remove(&old_id);
        }
        if let Some(old) = inner.tables.remove(&table_id) {
            inner.names.remove(&old.name);
        }

        inner.names.insert(name.clone(), table_id);
        inner.tables.insert(
            table_id,
            TableEntry {
                file,
                name,
                primary_key: primary_key.into(),
            },
        );
    }

    /// Returns the id of the table called `name`.
    pub fn table_id(&self, name: &str) -> Result<u32> {
        self.inner
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| SlateError::TableNotFound(name.to_string()))
    }

    /// Returns the heap file backing a table.
    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.with_entry(table_id, |entry| entry.file.clone())
    }

    pub fn primary_key(&self, table_id: u32) -> Result<String> {
        self.with_entry(table_id, |entry| entry.primary_key.clone())
    }

    pub fn table_name(&self, table_id: u32) -> Result<String> {
        self.with_entry(table_id, |entry| entry.name.clone())
    }

    /// Returns the ids of all registered tables, ascending.
    pub fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.inner.read().tables.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Removes every table.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tables.clear();
        inner.names.clear();
    }

    fn with_entry<T>(&self, table_id: u32, f: impl FnOnce(&TableEntry) -> T) -> Result<T> {
        self.inner
            .read()
            .tables
            .get(&table_id)
            .map(f)
            .ok_or_else(|| SlateError::TableNotFound(table_id.to_string()))
    }
}

impl SchemaLookup for Catalog {
    fn schema_of(&self, table_id: u32) -> Result<Arc<Schema>> {
        self.with_entry(table_id, |entry| entry.file.schema().clone())
    }
}
