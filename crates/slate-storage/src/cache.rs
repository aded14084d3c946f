//! Contract between heap files and the page cache that owns resident pages.

use crate::heap::HeapPage;
use parking_lot::RwLock;
use slate_common::page::PageId;
use slate_common::{Permission, Result, TransactionId};
use std::sync::Arc;

/// Shared handle to a cached page.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Serves pages to transactions.
///
/// Heap files fetch every page they scan or mutate through this trait so
/// that locking and caching stay in one place.
pub trait PageCache: Send + Sync {
    /// Returns the page, loading it if needed, once `tid` holds the lock
    /// `permission` requires.
    ///
    /// Fails with `TransactionAborted` when the lock cannot be granted and
    /// `ResourceUnavailable` when no room can be made for the page.
    fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<PageHandle>;

    /// Drops whatever lock `tid` holds on the page.
    fn release_page(&self, tid: TransactionId, page_id: PageId);

    /// Returns true if `tid` holds any lock on the page.
    fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool;
}
