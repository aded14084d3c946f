//! Buffer frame management.

use slate_common::page::PageId;
use slate_common::TransactionId;
use slate_storage::PageHandle;
use std::sync::Arc;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single decoded page.
pub struct BufferFrame {
    page_id: PageId,
    page: PageHandle,
}

impl BufferFrame {
    pub fn new(page_id: PageId, page: PageHandle) -> Self {
        Self { page_id, page }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns a new handle to the cached page.
    #[inline]
    pub fn handle(&self) -> PageHandle {
        self.page.clone()
    }

    /// Returns true if a handle to this page lives outside the pool.
    pub fn is_pinned(&self) -> bool {
        Arc::strong_count(&self.page) > 1
    }

    /// Transaction that dirtied the page, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.page.read().is_dirty()
    }

    /// A frame can be evicted when nobody outside the pool holds its page
    /// and the page has no unflushed changes.
    pub fn is_evictable(&self) -> bool {
        !self.is_pinned() && self.dirtier().is_none()
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("page_id", &self.page_id)
            .field("pinned", &self.is_pinned())
            .finish()
    }
}
