//! Error types for SlateDB.

use crate::page::PageId;
use thiserror::Error;

/// Result type alias using SlateError.
pub type Result<T> = std::result::Result<T, SlateError>;

/// Errors that can occur in SlateDB operations.
#[derive(Debug, Error)]
pub enum SlateError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Schema errors
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Field index {index} out of range (schema has {len} fields)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Malformed field: {0}")]
    MalformedField(String),

    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    // Page errors
    #[error("Page full, unable to insert tuple into page {page_id}")]
    PageFull { page_id: PageId },

    #[error("Tuple not on this page: {0}")]
    TupleNotOnThisPage(String),

    #[error("Page corrupted: {page_id}, reason: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: PageId },

    #[error("Page size mismatch: expected {expected}, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    // Heap file errors
    #[error("Database error: {0}")]
    Db(String),

    #[error("Iterator has not been opened")]
    IteratorNotOpen,

    #[error("Iterator exhausted")]
    IteratorExhausted,

    // Transaction and cache errors
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    // Configuration errors
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}
