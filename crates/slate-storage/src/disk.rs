//! Page-level file I/O for a single backing file.

use parking_lot::Mutex;
use slate_common::page::{page_offset, PageId};
use slate_common::{Result, SlateError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Reads and writes fixed-size pages of one file.
///
/// Page `n` occupies bytes `[n * page_size, (n + 1) * page_size)`. The file
/// only grows, one whole page at a time.
pub struct PageFile {
    path: PathBuf,
    page_size: usize,
    fsync_enabled: bool,
    handle: Mutex<FileHandle>,
}

/// Handle for the open data file.
struct FileHandle {
    file: File,
    /// Number of complete pages in the file.
    num_pages: u32,
}

impl PageFile {
    /// Opens or creates the file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize, fsync_enabled: bool) -> Result<Self> {
        if page_size == 0 {
            return Err(SlateError::InvalidParameter {
                name: "page_size".to_string(),
                value: "0".to_string(),
            });
        }
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / page_size as u64) as u32;

        Ok(Self {
            path,
            page_size,
            fsync_enabled,
            handle: Mutex::new(FileHandle { file, num_pages }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of complete pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.handle.lock().num_pages
    }

    /// Reads page `page_num`.
    pub fn read_page(&self, page_num: u32) -> Result<Vec<u8>> {
        let mut handle = self.handle.lock();
        if page_num >= handle.num_pages {
            return Err(self.not_found(page_num));
        }

        let offset = page_offset(page_num, self.page_size);
        handle.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; self.page_size];
        match handle.file.read_exact(&mut buffer) {
            Ok(()) => Ok(buffer),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(self.not_found(page_num))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes page `page_num`; writing at `num_pages()` appends.
    pub fn write_page(&self, page_num: u32, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(SlateError::PageSizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        let mut handle = self.handle.lock();
        // Writing further out would leave a hole in the page sequence
        if page_num > handle.num_pages {
            return Err(self.not_found(page_num));
        }

        let offset = page_offset(page_num, self.page_size);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(data)?;

        if self.fsync_enabled {
            handle.file.sync_all()?;
        }

        if page_num == handle.num_pages {
            handle.num_pages += 1;
        }

        Ok(())
    }

    /// Appends a zeroed page and returns its page number.
    pub fn allocate_page(&self) -> Result<u32> {
        let mut handle = self.handle.lock();
        let page_num = handle.num_pages;

        let offset = page_offset(page_num, self.page_size);
        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(&vec![0u8; self.page_size])?;

        if self.fsync_enabled {
            handle.file.sync_all()?;
        }

        handle.num_pages = page_num + 1;
        Ok(page_num)
    }

    /// Flushes all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.handle.lock().file.sync_all()?;
        Ok(())
    }

    fn not_found(&self, page_num: u32) -> SlateError {
        // The table id is not known at this level
        SlateError::PageNotFound {
            page_id: PageId::new(0, page_num),
        }
    }
}

impl std::fmt::Debug for PageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFile")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("num_pages", &self.num_pages())
            .finish()
    }
}
