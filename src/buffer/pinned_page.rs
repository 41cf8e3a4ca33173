//! RAII guard for pinned pages.
//!
//! A [`PinnedPage`] records the pin taken by
//! [`read_page_pinned`](crate::buffer::BufMgr::read_page_pinned) or
//! [`alloc_page_pinned`](crate::buffer::BufMgr::alloc_page_pinned) and
//! releases it when dropped, so a pin can never leak. Mutable access
//! marks the page dirty automatically.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use log::warn;

use crate::buffer::buf_mgr::BufMgr;
use crate::common::{FrameId, PageNumber};
use crate::storage::{DbFile, Page};

/// A pinned page that unpins itself on drop.
///
/// The guard mutably borrows the buffer manager for its lifetime, which
/// makes the one-unpin-per-pin rule a compile-time property and also
/// means only one guard can live at a time. Workloads holding several
/// pins at once use the explicit
/// [`read_page`](BufMgr::read_page)/[`unpin_page`](BufMgr::unpin_page)
/// protocol instead.
pub struct PinnedPage<'a> {
    bufmgr: &'a mut BufMgr,
    file: Arc<DbFile>,
    page_no: PageNumber,
    frame: FrameId,
    dirty: bool,
}

impl<'a> PinnedPage<'a> {
    pub(crate) fn new(
        bufmgr: &'a mut BufMgr,
        file: Arc<DbFile>,
        page_no: PageNumber,
        frame: FrameId,
    ) -> Self {
        Self {
            bufmgr,
            file,
            page_no,
            frame,
            dirty: false,
        }
    }

    /// Number of the pinned page.
    #[inline]
    pub fn page_number(&self) -> PageNumber {
        self.page_no
    }

    /// Record that the page was modified, so the unpin on drop reports
    /// it dirty. Mutable access does this implicitly.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Deref for PinnedPage<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        self.bufmgr.frame_page(self.frame)
    }
}

impl DerefMut for PinnedPage<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.dirty = true;
        self.bufmgr.frame_page_mut(self.frame)
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        let file = Arc::clone(&self.file);
        if let Err(err) = self.bufmgr.unpin_page(&file, self.page_no, self.dirty) {
            warn!("unpin of {} on guard drop failed: {}", self.page_no, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (BufMgr, Arc<DbFile>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let file = Arc::new(DbFile::create(dir.path().join("test.db")).unwrap());
        (BufMgr::new(3), file, dir)
    }

    #[test]
    fn test_guard_unpins_on_drop() {
        let (mut bm, file, _dir) = setup();
        let page_no = file.allocate_page().unwrap().page_number();

        {
            let guard = bm.read_page_pinned(&file, page_no).unwrap();
            assert_eq!(guard.page_number(), page_no);
        }
        assert_eq!(bm.pin_count(&file, page_no), Some(0));
    }

    #[test]
    fn test_clean_guard_stays_clean() {
        let (mut bm, file, _dir) = setup();
        let page_no = file.allocate_page().unwrap().page_number();

        {
            let guard = bm.read_page_pinned(&file, page_no).unwrap();
            assert_eq!(guard.as_slice()[0], 0);
        }
        let frame = FrameId::new(0);
        assert!(!bm.frame_desc(frame).is_dirty());
    }

    #[test]
    fn test_mutable_access_marks_dirty() {
        let (mut bm, file, _dir) = setup();
        let page_no = file.allocate_page().unwrap().page_number();

        {
            let mut guard = bm.read_page_pinned(&file, page_no).unwrap();
            guard.as_mut_slice()[0] = 0x5A;
        }

        bm.flush_file(&file).unwrap();
        assert_eq!(file.read_page(page_no).unwrap().as_slice()[0], 0x5A);
    }

    #[test]
    fn test_alloc_pinned_roundtrip() {
        let (mut bm, file, _dir) = setup();

        let page_no = {
            let mut guard = bm.alloc_page_pinned(&file).unwrap();
            guard.as_mut_slice()[..5].copy_from_slice(b"hello");
            guard.page_number()
        };

        bm.flush_file(&file).unwrap();
        assert_eq!(&file.read_page(page_no).unwrap().as_slice()[..5], b"hello");
    }

    #[test]
    fn test_explicit_mark_dirty() {
        let (mut bm, file, _dir) = setup();
        let page_no = file.allocate_page().unwrap().page_number();

        {
            let mut guard = bm.read_page_pinned(&file, page_no).unwrap();
            guard.mark_dirty();
        }
        let frame = FrameId::new(0);
        assert!(bm.frame_desc(frame).is_dirty());
    }
}
