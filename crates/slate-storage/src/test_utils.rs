//! In-memory page cache for unit tests.

use crate::cache::{PageCache, PageHandle};
use crate::heap::HeapFile;
use parking_lot::{Mutex, RwLock};
use slate_common::page::PageId;
use slate_common::{Permission, Result, SlateError, TransactionId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caches every page of one heap file forever and records, without
/// enforcing, which transactions hold which pages.
pub struct MemoryPageCache {
    file: Arc<HeapFile>,
    pages: Mutex<HashMap<PageId, PageHandle>>,
    held: Mutex<HashSet<(TransactionId, PageId)>>,
    rejecting: AtomicBool,
}

impl MemoryPageCache {
    pub fn new(file: Arc<HeapFile>) -> Self {
        Self {
            file,
            pages: Mutex::new(HashMap::new()),
            held: Mutex::new(HashSet::new()),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Makes every later fetch fail with `TransactionAborted`.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

impl PageCache for MemoryPageCache {
    fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        _permission: Permission,
    ) -> Result<PageHandle> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SlateError::TransactionAborted(format!(
                "{} rejected for {}",
                page_id, tid
            )));
        }

        let mut pages = self.pages.lock();
        let handle = match pages.get(&page_id) {
            Some(handle) => handle.clone(),
            None => {
                let handle = Arc::new(RwLock::new(self.file.read_page(page_id)?));
                pages.insert(page_id, handle.clone());
                handle
            }
        };
        self.held.lock().insert((tid, page_id));
        Ok(handle)
    }

    fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.held.lock().remove(&(tid, page_id));
    }

    fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.held.lock().contains(&(tid, page_id))
    }
}
