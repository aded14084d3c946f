//! Page-by-page iterator over every tuple of a heap file.

use crate::cache::PageCache;
use crate::heap::file::HeapFile;
use crate::tuple::Tuple;
use slate_common::page::PageId;
use slate_common::{Permission, Result, SlateError, TransactionId};

enum IterState {
    Unopened,
    /// Remaining tuples of page `page_num`, copied out of the cache.
    OnPage {
        page_num: u32,
        tuples: std::vec::IntoIter<Tuple>,
    },
    Exhausted,
}

/// Streams the tuples of a heap file in page and slot order.
///
/// Pages are fetched read-only through the page cache one at a time; only
/// the current page's tuples are held.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    cache: &'a dyn PageCache,
    tid: TransactionId,
    state: IterState,
}

impl<'a> HeapFileIterator<'a> {
    pub(crate) fn new(file: &'a HeapFile, cache: &'a dyn PageCache, tid: TransactionId) -> Self {
        Self {
            file,
            cache,
            tid,
            state: IterState::Unopened,
        }
    }

    /// Positions the iterator on the first page.
    pub fn open(&mut self) -> Result<()> {
        self.state = if self.file.num_pages() == 0 {
            IterState::Exhausted
        } else {
            self.load_page(0)?
        };
        Ok(())
    }

    /// Returns true if another tuple is available.
    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            match &self.state {
                IterState::Unopened => return Err(SlateError::IteratorNotOpen),
                IterState::Exhausted => return Ok(false),
                IterState::OnPage { page_num, tuples } => {
                    if !tuples.as_slice().is_empty() {
                        return Ok(true);
                    }
                    let next = page_num + 1;
                    self.state = if next < self.file.num_pages() {
                        self.load_page(next)?
                    } else {
                        IterState::Exhausted
                    };
                }
            }
        }
    }

    /// Returns the next tuple.
    pub fn next_tuple(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(SlateError::IteratorExhausted);
        }
        match &mut self.state {
            IterState::OnPage { tuples, .. } => tuples.next().ok_or(SlateError::IteratorExhausted),
            _ => Err(SlateError::IteratorExhausted),
        }
    }

    /// Restarts from the first page.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    /// Returns the iterator to its unopened state.
    pub fn close(&mut self) {
        self.state = IterState::Unopened;
    }

    fn load_page(&self, page_num: u32) -> Result<IterState> {
        let page_id = PageId::new(self.file.id(), page_num);
        let handle = self
            .cache
            .fetch_page(self.tid, page_id, Permission::ReadOnly)?;
        let tuples: Vec<Tuple> = handle.read().iter().cloned().collect();
        Ok(IterState::OnPage {
            page_num,
            tuples: tuples.into_iter(),
        })
    }
}

/// Yields `Err` once if a page cannot be fetched, then stops.
impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_tuple()),
            Ok(false) => None,
            Err(e) => {
                self.state = IterState::Exhausted;
                Some(Err(e))
            }
        }
    }
}
