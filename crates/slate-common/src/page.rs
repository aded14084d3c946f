//! Page identity for SlateDB storage.

use serde::{Deserialize, Serialize};

/// Default page size in bytes (4 KB).
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Unique identifier for a page of a heap file.
///
/// PageId consists of the owning table's ID and the page number within
/// the table's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    /// Table identifier (stable hash of the backing file's absolute path).
    pub table_id: u32,
    /// Page number within the file (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(table_id: u32, page_num: u32) -> Self {
        Self { table_id, page_num }
    }

}

/// Byte offset of page `page_num` in a file of `page_size`-byte pages.
pub fn page_offset(page_num: u32, page_size: usize) -> u64 {
    page_num as u64 * page_size as u64
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_num)
    }
}
