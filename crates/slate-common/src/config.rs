//! Configuration structures for SlateDB.

use crate::error::{Result, SlateError};
use crate::page::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storage configuration for heap files and the page cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for table files.
    pub data_dir: PathBuf,
    /// Page size in bytes, shared by every heap file.
    pub page_size: usize,
    /// Page cache size in number of pages.
    pub buffer_pool_pages: usize,
    /// How long a transaction waits for a page lock before aborting.
    pub lock_timeout_ms: u64,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_pages: 1000,
            lock_timeout_ms: 500,
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the lock wait timeout.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SlateError::InvalidParameter {
                name: "page_size".to_string(),
                value: self.page_size.to_string(),
            });
        }
        if self.buffer_pool_pages == 0 {
            return Err(SlateError::InvalidParameter {
                name: "buffer_pool_pages".to_string(),
                value: self.buffer_pool_pages.to_string(),
            });
        }
        Ok(())
    }
}
