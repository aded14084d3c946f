//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::lock::LockManager;
use crate::replacer::{ClockReplacer, Replacer};
use parking_lot::{Mutex, RwLock};
use slate_common::page::PageId;
use slate_common::{Permission, Result, SlateError, StorageConfig, TransactionId};
use slate_storage::{Catalog, HeapPage, PageCache, PageHandle, Tuple};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// How long a transaction waits for a page lock before aborting.
    pub lock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: 1000,
            lock_timeout: Duration::from_millis(500),
        }
    }
}

impl From<&StorageConfig> for BufferPoolConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            num_frames: config.buffer_pool_pages,
            lock_timeout: config.lock_timeout(),
        }
    }
}

struct PoolInner {
    frames: Vec<Option<BufferFrame>>,
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

impl PoolInner {
    fn frame(&self, frame_id: FrameId) -> Option<&BufferFrame> {
        self.frames[frame_id.0 as usize].as_ref()
    }

    fn handle(&self, page_id: PageId) -> Option<PageHandle> {
        let frame_id = *self.page_table.get(&page_id)?;
        self.frame(frame_id).map(BufferFrame::handle)
    }

    /// Resident pages whose frames satisfy `select`.
    fn pages_where(&self, select: impl Fn(&BufferFrame) -> bool) -> Vec<PageHandle> {
        self.frames
            .iter()
            .flatten()
            .filter(|frame| select(frame))
            .map(BufferFrame::handle)
            .collect()
    }

    /// Resident pages whose dirty marker satisfies `select`.
    fn dirty_pages(&self, select: impl Fn(TransactionId) -> bool) -> Vec<PageHandle> {
        self.pages_where(|frame| frame.dirtier().is_some_and(&select))
    }
}

/// Buffer pool manager.
///
/// Caches decoded heap pages in a fixed number of frames and hands them to
/// transactions under page-level locks:
/// - Page ID to frame ID mapping
/// - Free frame list for new pages
/// - Clock replacement over clean, unreferenced pages (dirty pages are
///   never evicted)
/// - Before-image rollback on abort, flush on commit
pub struct BufferPool {
    config: BufferPoolConfig,
    catalog: Arc<Catalog>,
    locks: LockManager,
    inner: Mutex<PoolInner>,
    replacer: ClockReplacer,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool reading pages through `catalog`.
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>) -> Self {
        let num_frames = config.num_frames;

        // All frames start in free list, lowest id on top
        let free_list: Vec<_> = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Self {
            locks: LockManager::new(config.lock_timeout),
            inner: Mutex::new(PoolInner {
                frames: (0..num_frames).map(|_| None).collect(),
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: ClockReplacer::new(num_frames),
            config,
            catalog,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Checks if a page is in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.contains_key(&page_id)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the lock `tid` holds on a page, if any.
    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<Permission> {
        self.locks.lock_mode(tid, page_id)
    }

    /// Loads a page into a frame, evicting if the pool is full.
    fn load_page(&self, inner: &mut PoolInner, page_id: PageId) -> Result<PageHandle> {
        let frame_id = self.allocate_frame(inner)?;

        let page = match self
            .catalog
            .file(page_id.table_id)
            .and_then(|file| file.read_page(page_id))
        {
            Ok(page) => page,
            Err(e) => {
                inner.free_list.push(frame_id);
                return Err(e);
            }
        };

        let handle = Arc::new(RwLock::new(page));
        inner.frames[frame_id.0 as usize] = Some(BufferFrame::new(page_id, handle.clone()));
        inner.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        Ok(handle)
    }

    /// Takes a free frame, or evicts a clean unreferenced page.
    fn allocate_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop() {
            return Ok(frame_id);
        }

        let victim = self
            .replacer
            .evict(&|fid| inner.frame(fid).is_some_and(BufferFrame::is_evictable))
            .ok_or_else(|| {
                SlateError::ResourceUnavailable(format!(
                    "all {} frames hold dirty or in-use pages",
                    self.config.num_frames
                ))
            })?;

        if let Some(frame) = inner.frames[victim.0 as usize].take() {
            inner.page_table.remove(&frame.page_id());
        }
        self.evictions.fetch_add(1, Ordering::Relaxed);
        Ok(victim)
    }

    /// Inserts `tuple` into table `table_id` on behalf of `tid`.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: u32, tuple: &mut Tuple) -> Result<()> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        for page in pages {
            self.mark_dirtied(&page, tid);
        }
        Ok(())
    }

    /// Deletes `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| SlateError::Db("tuple has no record id".to_string()))?;
        let file = self.catalog.file(record_id.page_id.table_id)?;
        let page = file.delete_tuple(self, tid, tuple)?;
        self.mark_dirtied(&page, tid);
        Ok(())
    }

    /// Makes sure a page returned by a heap file is the resident copy and is
    /// marked dirty by `tid`.
    fn mark_dirtied(&self, page: &PageHandle, tid: TransactionId) {
        let page_id = page.read().page_id();
        {
            let mut inner = self.inner.lock();
            let resident = inner.handle(page_id);
            let is_resident = resident.is_some_and(|resident| Arc::ptr_eq(&resident, page));
            if !is_resident {
                if let Some(frame_id) = inner.page_table.get(&page_id).copied() {
                    inner.frames[frame_id.0 as usize] =
                        Some(BufferFrame::new(page_id, page.clone()));
                    self.replacer.record_access(frame_id);
                }
            }
        }
        page.write().mark_dirty(true, tid);
    }

    /// Writes one page to disk if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let handle = self.inner.lock().handle(page_id);
        match handle {
            Some(handle) => self.write_back(&handle),
            None => Ok(()),
        }
    }

    /// Writes every dirty page to disk.
    ///
    /// This also writes uncommitted changes; it is meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        let dirty = self.inner.lock().dirty_pages(|_| true);
        for handle in dirty {
            self.write_back(&handle)?;
        }
        Ok(())
    }

    /// Writes every page dirtied by `tid` to disk.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let dirty = self.inner.lock().dirty_pages(|dirtier| dirtier == tid);
        for handle in dirty {
            self.write_back(&handle)?;
        }
        Ok(())
    }

    fn write_back(&self, handle: &PageHandle) -> Result<()> {
        let mut page = handle.write();
        if let Some(tid) = page.is_dirty() {
            let file = self.catalog.file(page.page_id().table_id)?;
            file.write_page(&page)?;
            page.mark_dirty(false, tid);
        }
        Ok(())
    }

    /// Finishes `tid`: a commit writes its pages and makes them the new
    /// before images, an abort restores its pages from their before images.
    /// Either way every lock `tid` holds is released.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let result = if commit {
            self.commit(tid)
        } else {
            self.abort(tid)
        };
        self.locks.release_all(tid);
        result
    }

    fn commit(&self, tid: TransactionId) -> Result<()> {
        let locked: HashSet<PageId> = self.locks.pages_locked_by(tid).into_iter().collect();
        let touched = self.inner.lock().pages_where(|frame| {
            frame.dirtier() == Some(tid) || locked.contains(&frame.page_id())
        });
        for handle in touched {
            self.write_back(&handle)?;
            handle.write().set_before_image()?;
        }
        Ok(())
    }

    fn abort(&self, tid: TransactionId) -> Result<()> {
        let dirty = self.inner.lock().dirty_pages(|dirtier| dirtier == tid);
        for handle in dirty {
            let mut page = handle.write();
            let restored: HeapPage = page.before_image()?;
            *page = restored;
        }
        Ok(())
    }

    /// Drops a page from the pool without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let mut inner = self.inner.lock();
        if let Some(frame_id) = inner.page_table.remove(&page_id) {
            inner.frames[frame_id.0 as usize] = None;
            self.replacer.remove(frame_id);
            inner.free_list.push(frame_id);
        }
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.inner.lock();
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;
        for frame in inner.frames.iter().flatten() {
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.dirtier().is_some() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: inner.free_list.len(),
            used_frames: inner.page_table.len(),
            pinned_frames,
            dirty_frames,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl PageCache for BufferPool {
    fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<PageHandle> {
        self.locks.acquire(tid, page_id, permission)?;

        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            if let Some(frame) = inner.frame(frame_id) {
                self.replacer.record_access(frame_id);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(frame.handle());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.load_page(&mut inner, page_id)
    }

    fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.locks.release(tid, page_id);
    }

    fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(tid, page_id)
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    /// Number of frames whose page is referenced outside the pool.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
    /// Fetches served from a resident page.
    pub hits: u64,
    /// Fetches that read from disk.
    pub misses: u64,
    /// Pages evicted to make room.
    pub evictions: u64,
}
