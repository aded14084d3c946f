//! HeapFile: one table stored as a sequence of fixed-size heap pages.
//!
//! Page reads and writes go straight to disk. Tuple inserts, deletes and
//! scans go through a [`PageCache`], which owns every resident page.

use crate::cache::{PageCache, PageHandle};
use crate::disk::PageFile;
use crate::heap::iter::HeapFileIterator;
use crate::heap::page::HeapPage;
use crate::schema::Schema;
use crate::tuple::Tuple;
use serde::{Deserialize, Serialize};
use slate_common::page::{PageId, DEFAULT_PAGE_SIZE};
use slate_common::{Permission, Result, SlateError, StorageConfig, TransactionId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for HeapFile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapFileConfig {
    /// Page size in bytes.
    pub page_size: usize,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for HeapFileConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fsync_enabled: true,
        }
    }
}

impl From<&StorageConfig> for HeapFileConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            page_size: config.page_size,
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// Table storage backed by a single file of heap pages.
#[derive(Debug)]
pub struct HeapFile {
    /// Absolute path of the backing file.
    path: PathBuf,
    /// CRC-32 of `path`.
    id: u32,
    schema: Arc<Schema>,
    file: PageFile,
}

impl HeapFile {
    /// Opens or creates the heap file at `path`.
    ///
    /// Fails with `InvalidParameter` if the page size holds no tuple of
    /// `schema`, or more tuples than a page can number.
    pub fn open(
        path: impl AsRef<Path>,
        schema: Arc<Schema>,
        config: HeapFileConfig,
    ) -> Result<Self> {
        let num_slots = HeapPage::num_slots_for(config.page_size, schema.byte_width());
        if num_slots == 0 || num_slots > HeapPage::MAX_SLOTS {
            return Err(SlateError::InvalidParameter {
                name: "page_size".to_string(),
                value: format!(
                    "{} ({} slots of {} bytes, expected 1..={})",
                    config.page_size,
                    num_slots,
                    schema.byte_width(),
                    HeapPage::MAX_SLOTS
                ),
            });
        }

        let file = PageFile::open(path, config.page_size, config.fsync_enabled)?;
        let path = std::fs::canonicalize(file.path())?;
        let id = crc32fast::hash(path.to_string_lossy().as_bytes());

        Ok(Self {
            path,
            id,
            schema,
            file,
        })
    }

    /// Stable identifier of this table, derived from its absolute path.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.file.num_pages()
    }

    /// Reads and decodes a page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        if page_id.table_id != self.id {
            return Err(SlateError::PageNotFound { page_id });
        }
        let data = self
            .file
            .read_page(page_id.page_num)
            .map_err(|e| with_page_id(e, page_id))?;
        HeapPage::from_bytes(page_id, self.schema.clone(), self.page_size(), &data)
    }

    /// Encodes `page` and writes it at its offset, appending if it is the
    /// next page after the current end.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        if page_id.table_id != self.id {
            return Err(SlateError::PageNotFound { page_id });
        }
        let data = page.to_bytes()?;
        self.file
            .write_page(page_id.page_num, &data)
            .map_err(|e| with_page_id(e, page_id))
    }

    /// Adds `tuple` to the first page with a free slot, growing the file by
    /// one page when every page is full.
    ///
    /// Returns the pages that were modified.
    pub fn insert_tuple(
        &self,
        cache: &dyn PageCache,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageHandle>> {
        if **tuple.schema() != *self.schema {
            return Err(SlateError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        for page_num in 0..self.num_pages() {
            let page_id = PageId::new(self.id, page_num);
            let held_before = cache.holds_lock(tid, page_id);

            let handle = cache.fetch_page(tid, page_id, Permission::ReadOnly)?;
            let has_space = handle.read().num_empty_slots() > 0;
            if !has_space {
                if !held_before {
                    cache.release_page(tid, page_id);
                }
                continue;
            }

            let handle = cache.fetch_page(tid, page_id, Permission::ReadWrite)?;
            self.insert_into(&handle, tid, tuple)?;
            return Ok(vec![handle]);
        }

        let page_num = self.file.allocate_page()?;
        let page_id = PageId::new(self.id, page_num);
        let handle = cache.fetch_page(tid, page_id, Permission::ReadWrite)?;
        self.insert_into(&handle, tid, tuple)?;
        Ok(vec![handle])
    }

    fn insert_into(
        &self,
        handle: &PageHandle,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let mut page = handle.write();
        page.insert_tuple(tuple)?;
        page.mark_dirty(true, tid);
        Ok(())
    }

    /// Removes `tuple` from the page its record id points to.
    pub fn delete_tuple(
        &self,
        cache: &dyn PageCache,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<PageHandle> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| SlateError::Db("tuple has no record id".to_string()))?;
        if record_id.page_id.table_id != self.id {
            return Err(SlateError::Db(format!(
                "tuple {} does not belong to table {}",
                record_id, self.id
            )));
        }

        let handle = cache.fetch_page(tid, record_id.page_id, Permission::ReadWrite)?;
        {
            let mut page = handle.write();
            page.delete_tuple(tuple)?;
            page.mark_dirty(true, tid);
        }
        Ok(handle)
    }

    /// Returns an unopened iterator over every tuple in the file.
    pub fn iter<'a>(
        &'a self,
        cache: &'a dyn PageCache,
        tid: TransactionId,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self, cache, tid)
    }

    /// Returns an iterator already positioned on the first page.
    pub fn scan<'a>(
        &'a self,
        cache: &'a dyn PageCache,
        tid: TransactionId,
    ) -> Result<HeapFileIterator<'a>> {
        let mut iter = self.iter(cache, tid);
        iter.open()?;
        Ok(iter)
    }

    /// Flushes file contents to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync()
    }
}

fn with_page_id(err: SlateError, page_id: PageId) -> SlateError {
    match err {
        SlateError::PageNotFound { .. } => SlateError::PageNotFound { page_id },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::test_utils::MemoryPageCache;
    use crate::tuple::RecordId;
    use slate_common::FieldType;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 50;

    fn people() -> Arc<Schema> {
        Arc::new(
            Schema::named([
                (FieldType::Int, "id"),
                (FieldType::text_with_capacity(8), "name"),
            ])
            .unwrap(),
        )
    }

    fn person(schema: &Arc<Schema>, id: i32, name: &str) -> Tuple {
        Tuple::new(schema.clone(), vec![Field::Int(id), Field::from(name)]).unwrap()
    }

    fn create_test_file() -> (Arc<HeapFile>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = HeapFileConfig {
            page_size: PAGE_SIZE,
            fsync_enabled: false,
        };
        let file = HeapFile::open(dir.path().join("people.dat"), people(), config).unwrap();
        (Arc::new(file), dir)
    }

    #[test]
    fn test_open_empty() {
        let (file, _dir) = create_test_file();
        assert_eq!(file.num_pages(), 0);
        assert_eq!(file.page_size(), PAGE_SIZE);
        assert!(file.path().is_absolute());
        assert_eq!(*file.schema(), people());
    }

    #[test]
    fn test_id_is_stable_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let a = HeapFile::open(&path, people(), HeapFileConfig::default()).unwrap();
        let b = HeapFile::open(&path, people(), HeapFileConfig::default()).unwrap();
        let c = HeapFile::open(dir.path().join("u.dat"), people(), HeapFileConfig::default())
            .unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id(), crc32fast::hash(a.path().to_string_lossy().as_bytes()));
    }

    #[test]
    fn test_open_rejects_unusable_page_size() {
        let dir = tempdir().unwrap();
        let ints = Arc::new(Schema::from_types(vec![FieldType::Int]).unwrap());

        for page_size in [1 << 20, 4, 0] {
            let config = HeapFileConfig {
                page_size,
                fsync_enabled: false,
            };
            let path = dir.path().join(format!("t{}.dat", page_size));
            let result = HeapFile::open(&path, ints.clone(), config);
            assert!(matches!(result, Err(SlateError::InvalidParameter { .. })));
            assert!(!path.exists());
        }

        // Exactly MAX_SLOTS four-byte slots still opens and accepts inserts
        let page_size = HeapPage::MAX_SLOTS * 4 + HeapPage::MAX_SLOTS / 8;
        assert_eq!(HeapPage::num_slots_for(page_size, 4), HeapPage::MAX_SLOTS);
        let config = HeapFileConfig {
            page_size,
            fsync_enabled: false,
        };
        let path = dir.path().join("max.dat");
        let file = Arc::new(HeapFile::open(path, ints.clone(), config).unwrap());
        let cache = MemoryPageCache::new(file.clone());
        let mut tuple = Tuple::new(ints, vec![Field::Int(1)]).unwrap();
        file.insert_tuple(&cache, TransactionId(1), &mut tuple).unwrap();
        assert_eq!(file.num_pages(), 1);
    }

    #[test]
    fn test_config_from_storage_config() {
        let storage = StorageConfig {
            page_size: 8192,
            fsync_enabled: false,
            ..Default::default()
        };
        let config = HeapFileConfig::from(&storage);
        assert_eq!(config.page_size, 8192);
        assert!(!config.fsync_enabled);
    }

    #[test]
    fn test_write_then_read_page() {
        let (file, _dir) = create_test_file();
        let schema = file.schema().clone();
        let page_id = PageId::new(file.id(), 0);

        let mut page = HeapPage::new_empty(page_id, schema.clone(), PAGE_SIZE).unwrap();
        page.insert_tuple(&mut person(&schema, 5, "eve")).unwrap();
        file.write_page(&page).unwrap();
        assert_eq!(file.num_pages(), 1);

        let read = file.read_page(page_id).unwrap();
        assert_eq!(read.tuple_at(0), page.tuple_at(0));
        assert_eq!(
            read.tuple_at(0).unwrap().record_id(),
            Some(RecordId::new(page_id, 0))
        );
    }

    #[test]
    fn test_read_page_errors() {
        let (file, _dir) = create_test_file();

        let missing = file.read_page(PageId::new(file.id(), 0));
        assert!(matches!(
            missing,
            Err(SlateError::PageNotFound { page_id }) if page_id == PageId::new(file.id(), 0)
        ));

        let foreign = file.read_page(PageId::new(file.id().wrapping_add(1), 0));
        assert!(matches!(foreign, Err(SlateError::PageNotFound { .. })));
    }

    #[test]
    fn test_write_page_past_end() {
        let (file, _dir) = create_test_file();
        let page = HeapPage::new_empty(PageId::new(file.id(), 3), file.schema().clone(), PAGE_SIZE)
            .unwrap();
        assert!(matches!(
            file.write_page(&page),
            Err(SlateError::PageNotFound { .. })
        ));
    }

    #[test]
    fn test_insert_grows_file() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let tid = TransactionId(1);
        let schema = file.schema().clone();

        for i in 0..3 {
            let mut t = person(&schema, i, "x");
            let pages = file.insert_tuple(&cache, tid, &mut t).unwrap();
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].read().is_dirty(), Some(tid));
            assert_eq!(t.record_id().unwrap().slot, i as u16);
        }
        assert_eq!(file.num_pages(), 1);

        let mut fourth = person(&schema, 3, "y");
        file.insert_tuple(&cache, tid, &mut fourth).unwrap();
        assert_eq!(file.num_pages(), 2);
        assert_eq!(
            fourth.record_id(),
            Some(RecordId::new(PageId::new(file.id(), 1), 0))
        );
    }

    #[test]
    fn test_insert_releases_full_pages() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let schema = file.schema().clone();

        let writer = TransactionId(1);
        for i in 0..3 {
            file.insert_tuple(&cache, writer, &mut person(&schema, i, "x"))
                .unwrap();
        }

        let other = TransactionId(2);
        file.insert_tuple(&cache, other, &mut person(&schema, 9, "z"))
            .unwrap();
        assert!(!cache.holds_lock(other, PageId::new(file.id(), 0)));
        assert!(cache.holds_lock(other, PageId::new(file.id(), 1)));
        // The writer already held page 0 and keeps it
        assert!(cache.holds_lock(writer, PageId::new(file.id(), 0)));
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let other = Arc::new(Schema::from_types(vec![FieldType::Int]).unwrap());
        let mut t = Tuple::new(other, vec![Field::Int(1)]).unwrap();

        let err = file.insert_tuple(&cache, TransactionId(1), &mut t).unwrap_err();
        assert!(matches!(err, SlateError::SchemaMismatch { .. }));
        assert_eq!(file.num_pages(), 0);
    }

    #[test]
    fn test_insert_propagates_cache_rejection() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let schema = file.schema().clone();
        file.insert_tuple(&cache, TransactionId(1), &mut person(&schema, 1, "a"))
            .unwrap();

        cache.set_rejecting(true);
        let err = file
            .insert_tuple(&cache, TransactionId(1), &mut person(&schema, 2, "b"))
            .unwrap_err();
        assert!(matches!(err, SlateError::TransactionAborted(_)));
    }

    #[test]
    fn test_delete_tuple() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let tid = TransactionId(1);
        let schema = file.schema().clone();

        let mut t = person(&schema, 1, "ann");
        file.insert_tuple(&cache, tid, &mut t).unwrap();
        let handle = file.delete_tuple(&cache, tid, &mut t).unwrap();

        assert!(t.record_id().is_none());
        assert!(!handle.read().is_slot_used(0));
        assert_eq!(handle.read().is_dirty(), Some(tid));
    }

    #[test]
    fn test_delete_tuple_errors() {
        let (file, _dir) = create_test_file();
        let cache = MemoryPageCache::new(file.clone());
        let schema = file.schema().clone();

        let mut unplaced = person(&schema, 1, "ann");
        assert!(matches!(
            file.delete_tuple(&cache, TransactionId(1), &mut unplaced),
            Err(SlateError::Db(_))
        ));

        let mut foreign = person(&schema, 1, "ann");
        foreign.set_record_id(Some(RecordId::new(PageId::new(file.id().wrapping_add(1), 0), 0)));
        assert!(matches!(
            file.delete_tuple(&cache, TransactionId(1), &mut foreign),
            Err(SlateError::Db(_))
        ));
    }
}
