//! SlateDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all SlateDB components.

pub mod config;
pub mod error;
pub mod page;
pub mod txn;
pub mod types;

pub use config::StorageConfig;
pub use error::{Result, SlateError};
pub use page::{PageId, DEFAULT_PAGE_SIZE};
pub use txn::{Permission, TransactionId};
pub use types::FieldType;
