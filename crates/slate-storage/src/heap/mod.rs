//! Heap storage implementation.
//!
//! This module provides heap-based tuple storage with:
//! - HeapPage: bitmap-and-slots page format for fixed-width tuples
//! - HeapFile: a table's page sequence, with inserts and deletes through the page cache
//! - HeapFileIterator: lazy scan across every page of a file

mod file;
mod iter;
mod page;

pub use file::{HeapFile, HeapFileConfig};
pub use iter::HeapFileIterator;
pub use page::{HeapPage, HeapPageIterator};
