//! DbFile - a paged file with allocate/delete page management.
//!
//! A [`DbFile`] owns one on-disk file laid out as fixed-size page slots.
//! Slot 0 holds the file header; data pages occupy slots 1 and up, so a
//! page number of 0 never names real data. Deleted slots are chained into
//! an on-disk free list and reused by later allocations.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageNumber, Result};
use crate::storage::page::Page;

/// Process-unique identity of an open file.
///
/// Frames in the buffer pool are partitioned by which file they belong
/// to, compared by identity rather than by filename: two opens of the
/// same path are two different files as far as caching is concerned.
/// The id is assigned once at open and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

fn next_file_id() -> FileId {
    FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Magic bytes at the start of every emberdb file.
const MAGIC: [u8; 4] = *b"EMDB";

/// Header layout within slot 0 (little-endian):
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic ("EMDB")
/// 4       4     page_count  (slots in the file, header included)
/// 8       4     free_head   (first slot of the free chain, 0 = none)
/// 12      4     free_count  (length of the free chain)
/// ```
const OFFSET_PAGE_COUNT: usize = 4;
const OFFSET_FREE_HEAD: usize = 8;
const OFFSET_FREE_COUNT: usize = 12;
const HEADER_SIZE: usize = 16;

/// Mutable file state behind the [`DbFile`] handle.
struct FileInner {
    file: File,
    /// Number of page slots in the file, header slot included.
    page_count: u32,
    /// First slot of the on-disk free chain, INVALID when empty.
    free_head: PageNumber,
    /// In-memory mirror of the free chain for O(1) allocation checks.
    free_set: HashSet<u32>,
}

impl FileInner {
    /// Whether `page_no` names a live data page.
    fn is_allocated(&self, page_no: PageNumber) -> bool {
        page_no.is_valid() && page_no.0 < self.page_count && !self.free_set.contains(&page_no.0)
    }

    fn write_header(&mut self) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        buf[OFFSET_PAGE_COUNT..OFFSET_PAGE_COUNT + 4]
            .copy_from_slice(&self.page_count.to_le_bytes());
        buf[OFFSET_FREE_HEAD..OFFSET_FREE_HEAD + 4]
            .copy_from_slice(&self.free_head.0.to_le_bytes());
        buf[OFFSET_FREE_COUNT..OFFSET_FREE_COUNT + 4]
            .copy_from_slice(&(self.free_set.len() as u32).to_le_bytes());

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Read the next-free link stored in the first bytes of a free slot.
    fn read_free_link(&mut self, page_no: PageNumber) -> Result<PageNumber> {
        self.file.seek(SeekFrom::Start(page_offset(page_no)))?;
        let mut buf = [0u8; 4];
        self.file.read_exact(&mut buf)?;
        Ok(PageNumber::new(u32::from_le_bytes(buf)))
    }

    /// Store a next-free link in the first bytes of a freed slot.
    fn write_free_link(&mut self, page_no: PageNumber, next: PageNumber) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_offset(page_no)))?;
        self.file.write_all(&next.0.to_le_bytes())?;
        Ok(())
    }
}

#[inline]
fn page_offset(page_no: PageNumber) -> u64 {
    (page_no.0 as u64) * (PAGE_SIZE as u64)
}

/// A paged file on disk.
///
/// All methods take `&self`; the OS file state sits behind a mutex so a
/// shared `Arc<DbFile>` can serve both as the buffer pool's write-back
/// target and as the client's lookup key.
///
/// # Durability
/// Every mutation (`allocate_page`, `delete_page`, `write_page`) ends
/// with `fsync`, matching the write-back contract of the buffer layer:
/// once a flush returns, the bytes are on disk.
pub struct DbFile {
    file_id: FileId,
    path: PathBuf,
    inner: Mutex<FileInner>,
}

impl DbFile {
    /// Create a new paged file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        let mut inner = FileInner {
            file,
            page_count: 1,
            free_head: PageNumber::INVALID,
            free_set: HashSet::new(),
        };

        // Reserve the full header slot so data slots start at PAGE_SIZE.
        inner.file.write_all(&[0u8; PAGE_SIZE])?;
        inner.write_header()?;
        inner.file.sync_all()?;

        let db_file = Self {
            file_id: next_file_id(),
            path: path.as_ref().to_path_buf(),
            inner: Mutex::new(inner),
        };
        debug!("created {} as {}", db_file.filename(), db_file.file_id);
        Ok(db_file)
    }

    /// Open an existing paged file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or
    /// does not carry an emberdb header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let filename = path.as_ref().display().to_string();

        let mut inner = FileInner {
            file,
            page_count: 0,
            free_head: PageNumber::INVALID,
            free_set: HashSet::new(),
        };

        let mut buf = [0u8; HEADER_SIZE];
        inner.file.seek(SeekFrom::Start(0))?;
        if inner.file.read_exact(&mut buf).is_err() || buf[..4] != MAGIC {
            return Err(Error::BadFileHeader { file: filename });
        }

        inner.page_count = u32::from_le_bytes([
            buf[OFFSET_PAGE_COUNT],
            buf[OFFSET_PAGE_COUNT + 1],
            buf[OFFSET_PAGE_COUNT + 2],
            buf[OFFSET_PAGE_COUNT + 3],
        ]);
        inner.free_head = PageNumber::new(u32::from_le_bytes([
            buf[OFFSET_FREE_HEAD],
            buf[OFFSET_FREE_HEAD + 1],
            buf[OFFSET_FREE_HEAD + 2],
            buf[OFFSET_FREE_HEAD + 3],
        ]));
        let free_count = u32::from_le_bytes([
            buf[OFFSET_FREE_COUNT],
            buf[OFFSET_FREE_COUNT + 1],
            buf[OFFSET_FREE_COUNT + 2],
            buf[OFFSET_FREE_COUNT + 3],
        ]);

        // Rebuild the in-memory free set by walking the on-disk chain.
        let mut cursor = inner.free_head;
        for _ in 0..free_count {
            if !cursor.is_valid() {
                return Err(Error::BadFileHeader { file: filename });
            }
            inner.free_set.insert(cursor.0);
            cursor = inner.read_free_link(cursor)?;
        }

        let db_file = Self {
            file_id: next_file_id(),
            path: path.as_ref().to_path_buf(),
            inner: Mutex::new(inner),
        };
        debug!("opened {} as {}", db_file.filename(), db_file.file_id);
        Ok(db_file)
    }

    /// Open an existing paged file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Identity of this open file.
    #[inline]
    pub fn id(&self) -> FileId {
        self.file_id
    }

    /// Human-readable identifier, used for error reporting.
    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }

    /// Number of live data pages in the file.
    pub fn allocated_pages(&self) -> u32 {
        let inner = self.inner.lock();
        inner.page_count - 1 - inner.free_set.len() as u32
    }

    /// Allocate a new page slot, reusing a freed slot when one exists.
    ///
    /// Returns a zeroed page carrying a fresh non-zero page number. The
    /// slot is zeroed and the header updated durably before returning.
    pub fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.inner.lock();

        let page_no = if inner.free_head.is_valid() {
            let reused = inner.free_head;
            inner.free_head = inner.read_free_link(reused)?;
            inner.free_set.remove(&reused.0);
            reused
        } else {
            let fresh = PageNumber::new(inner.page_count);
            inner.page_count += 1;
            fresh
        };

        inner.file.seek(SeekFrom::Start(page_offset(page_no)))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;
        inner.write_header()?;
        inner.file.sync_all()?;

        Ok(Page::with_number(page_no))
    }

    /// Deallocate a page slot, linking it into the free chain.
    ///
    /// # Errors
    /// Returns `PageNotFound` if the slot is not currently allocated.
    pub fn delete_page(&self, page_no: PageNumber) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.is_allocated(page_no) {
            return Err(Error::PageNotFound {
                file: self.filename(),
                page_no,
            });
        }

        let old_head = inner.free_head;
        inner.write_free_link(page_no, old_head)?;
        inner.free_head = page_no;
        inner.free_set.insert(page_no.0);
        inner.write_header()?;
        inner.file.sync_all()?;
        Ok(())
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `PageNotFound` if the slot is not currently allocated.
    pub fn read_page(&self, page_no: PageNumber) -> Result<Page> {
        let mut inner = self.inner.lock();
        if !inner.is_allocated(page_no) {
            return Err(Error::PageNotFound {
                file: self.filename(),
                page_no,
            });
        }

        inner.file.seek(SeekFrom::Start(page_offset(page_no)))?;
        let mut page = Page::with_number(page_no);
        inner.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    /// Write a page back to the slot named by `page.page_number()`.
    ///
    /// # Errors
    /// Returns `PageNotFound` if the slot is not currently allocated.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        let page_no = page.page_number();
        let mut inner = self.inner.lock();
        if !inner.is_allocated(page_no) {
            return Err(Error::PageNotFound {
                file: self.filename(),
                page_no,
            });
        }

        inner.file.seek(SeekFrom::Start(page_offset(page_no)))?;
        inner.file.write_all(page.as_slice())?;
        inner.file.sync_all()?;
        Ok(())
    }
}

impl std::fmt::Debug for DbFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbFile")
            .field("id", &self.file_id)
            .field("path", &self.path)
            .finish()
    }
}
