//! Frame descriptor - per-frame bookkeeping for the buffer pool.

use std::fmt;
use std::sync::Arc;

use crate::common::{FrameId, PageNumber};
use crate::storage::DbFile;

/// Metadata for one frame of the buffer pool.
///
/// A descriptor tracks which page its frame holds, how many clients have
/// it pinned, whether the cached copy differs from disk, and the clock
/// reference bit. The descriptor table is a dense array parallel to the
/// frame pool; `frame_no` equals the descriptor's index and never changes.
pub struct FrameDesc {
    pub(crate) frame_no: FrameId,
    pub(crate) file: Option<Arc<DbFile>>,
    pub(crate) page_no: PageNumber,
    pub(crate) pin_count: u32,
    pub(crate) dirty: bool,
    pub(crate) valid: bool,
    pub(crate) refbit: bool,
}

impl FrameDesc {
    /// Create the descriptor for frame `frame_no`, initially invalid.
    pub(crate) fn new(frame_no: FrameId) -> Self {
        Self {
            frame_no,
            file: None,
            page_no: PageNumber::INVALID,
            pin_count: 0,
            dirty: false,
            valid: false,
            refbit: false,
        }
    }

    /// Install a new occupant: valid, pinned once, clean, referenced.
    pub(crate) fn set(&mut self, file: Arc<DbFile>, page_no: PageNumber) {
        self.file = Some(file);
        self.page_no = page_no;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.refbit = true;
    }

    /// Return the descriptor to the invalid state. `frame_no` is immutable.
    pub(crate) fn clear(&mut self) {
        self.file = None;
        self.page_no = PageNumber::INVALID;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.refbit = false;
    }

    /// Whether this frame currently caches a page of `file`.
    pub(crate) fn owned_by(&self, file: &DbFile) -> bool {
        self.valid
            && self
                .file
                .as_ref()
                .map(|owner| owner.id() == file.id())
                .unwrap_or(false)
    }

    /// The frame this descriptor belongs to.
    #[inline]
    pub fn frame_no(&self) -> FrameId {
        self.frame_no
    }

    /// Page number of the cached page, sentinel when invalid.
    #[inline]
    pub fn page_no(&self) -> PageNumber {
        self.page_no
    }

    /// Number of outstanding pins on this frame.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Whether the cached copy has been modified since load.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the frame holds a real cached page.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl fmt::Display for FrameDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return write!(f, "invalid");
        }
        let filename = self
            .file
            .as_ref()
            .map(|file| file.filename())
            .unwrap_or_default();
        write!(
            f,
            "file: {} {} pin: {} dirty: {} refbit: {}",
            filename, self.page_no, self.pin_count, self.dirty, self.refbit
        )
    }
}
