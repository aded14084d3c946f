//! Storage engine for SlateDB.
//!
//! This crate provides:
//! - Schema descriptors and the fixed-width field codec
//! - Tuples and record identity
//! - Heap pages with a slot-occupancy bitmap
//! - Page-level file I/O and heap files
//! - The table catalog and the page cache contract

mod cache;
mod catalog;
mod disk;
mod field;
mod heap;
mod schema;
mod tuple;

#[cfg(test)]
mod test_utils;

pub use cache::{PageCache, PageHandle};
pub use catalog::{Catalog, SchemaLookup};
pub use disk::PageFile;
pub use field::Field;
pub use heap::{HeapFile, HeapFileConfig, HeapFileIterator, HeapPage, HeapPageIterator};
pub use schema::{Schema, SchemaField};
pub use tuple::{RecordId, Tuple};
