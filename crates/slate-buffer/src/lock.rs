//! Page-level shared/exclusive locks held by transactions.

use parking_lot::{Condvar, Mutex};
use slate_common::page::PageId;
use slate_common::{Permission, Result, SlateError, TransactionId};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct LockState {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
    /// Reader waiting to become the writer. Blocks new readers so the
    /// upgrade is not starved.
    upgrade_request: Option<TransactionId>,
}

impl LockState {
    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none() && self.upgrade_request.is_none()
    }
}

#[derive(Default)]
struct LockTable {
    locks: HashMap<PageId, LockState>,
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn state(&mut self, page_id: PageId) -> &mut LockState {
        self.locks.entry(page_id).or_default()
    }

    fn record(&mut self, tid: TransactionId, page_id: PageId) {
        self.held.entry(tid).or_default().insert(page_id);
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) {
        if let Some(state) = self.locks.get_mut(&page_id) {
            state.readers.remove(&tid);
            if state.writer == Some(tid) {
                state.writer = None;
            }
            if state.upgrade_request == Some(tid) {
                state.upgrade_request = None;
            }
            if state.is_free() {
                self.locks.remove(&page_id);
            }
        }
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }
    }
}

/// Grants shared locks for reads and exclusive locks for writes, waiting at
/// most `timeout` before giving up with `TransactionAborted`.
pub struct LockManager {
    table: Mutex<LockTable>,
    cond: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            cond: Condvar::new(),
            timeout,
        }
    }

    /// Acquires the lock `permission` needs.
    pub fn acquire(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> Result<()> {
        if permission.is_exclusive() {
            self.acquire_exclusive(tid, page_id)
        } else {
            self.acquire_shared(tid, page_id)
        }
    }

    fn acquire_shared(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        let mut table = self.table.lock();
        let deadline = Instant::now() + self.timeout;

        loop {
            let state = table.state(page_id);
            if state.readers.contains(&tid) || state.writer == Some(tid) {
                return Ok(());
            }
            if state.writer.is_none() && state.upgrade_request.is_none() {
                state.readers.insert(tid);
                table.record(tid, page_id);
                return Ok(());
            }
            if self.cond.wait_until(&mut table, deadline).timed_out() {
                return Err(Self::timed_out(tid, page_id, "shared"));
            }
        }
    }

    fn acquire_exclusive(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        let mut table = self.table.lock();
        let deadline = Instant::now() + self.timeout;

        let state = table.state(page_id);
        if state.writer == Some(tid) {
            return Ok(());
        }

        let upgrading = state.readers.contains(&tid);
        if upgrading {
            let pending = state.upgrade_request;
            match pending {
                // Two readers both upgrading would wait on each other forever
                Some(other) if other != tid => {
                    return Err(SlateError::TransactionAborted(format!(
                        "{} cannot upgrade lock on page {}: {} is already upgrading",
                        tid, page_id, other
                    )));
                }
                _ => state.upgrade_request = Some(tid),
            }
        }

        loop {
            let state = table.state(page_id);
            let others_reading = if upgrading {
                state.readers.len() > 1
            } else {
                !state.readers.is_empty()
            };
            let blocked = others_reading
                || state.writer.is_some()
                || (!upgrading && state.upgrade_request.is_some());

            if !blocked {
                state.readers.remove(&tid);
                state.writer = Some(tid);
                if upgrading {
                    state.upgrade_request = None;
                }
                table.record(tid, page_id);
                return Ok(());
            }

            if self.cond.wait_until(&mut table, deadline).timed_out() {
                if upgrading {
                    table.state(page_id).upgrade_request = None;
                    self.cond.notify_all();
                }
                return Err(Self::timed_out(tid, page_id, "exclusive"));
            }
        }
    }

    /// Releases whatever lock `tid` holds on `page_id`.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        self.table.lock().release(tid, page_id);
        self.cond.notify_all();
    }

    /// Releases every lock held by `tid` and returns the affected pages.
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        for &page_id in &pages {
            table.release(tid, page_id);
        }
        drop(table);
        self.cond.notify_all();
        pages
    }

    /// Returns the strongest lock `tid` holds on `page_id`.
    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<Permission> {
        let table = self.table.lock();
        let state = table.locks.get(&page_id)?;
        if state.writer == Some(tid) {
            Some(Permission::ReadWrite)
        } else if state.readers.contains(&tid) {
            Some(Permission::ReadOnly)
        } else {
            None
        }
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    /// Pages on which `tid` holds a lock.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .held
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    fn timed_out(tid: TransactionId, page_id: PageId, mode: &str) -> SlateError {
        SlateError::TransactionAborted(format!(
            "{} timed out waiting for {} lock on page {}",
            tid, mode, page_id
        ))
    }
}
