//! Buffer manager - the core page caching layer.
//!
//! The [`BufMgr`] provides:
//! - Page caching between [`DbFile`]s and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and flush
//! - Clock (second-chance) victim selection

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::buffer::frame_desc::FrameDesc;
use crate::buffer::page_table::PageTable;
use crate::buffer::pinned_page::PinnedPage;
use crate::buffer::stats::BufStats;
use crate::common::{Error, FrameId, PageNumber, Result};
use crate::storage::{DbFile, Page};

/// Manages a fixed pool of frames caching pages of any number of files.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────────────┐
/// │                          BufMgr                            │
/// │  ┌───────────────────┐   ┌─────────────────────────────┐   │
/// │  │    page_table     │   │       pool: [Page; N]       │   │
/// │  │(file,page)→ frame │──▶│  [Frame0] [Frame1] ...      │   │
/// │  └───────────────────┘   └─────────────────────────────┘   │
/// │  ┌───────────────────┐   ┌─────────────────────────────┐   │
/// │  │ descs: [desc; N]  │   │  clock_hand ──▶ victim      │   │
/// │  │ pin/dirty/refbit  │   │  selection                  │   │
/// │  └───────────────────┘   └─────────────────────────────┘   │
/// └────────────────────────────────────────────────────────────┘
/// ```
///
/// Pages are identified by `(file, page number)`, with files compared by
/// the identity of the open handle. A hit bumps the pin count and sets
/// the reference bit; a miss evicts a victim chosen by the clock sweep,
/// writing it back first when dirty.
///
/// # Threading
/// The manager is single-threaded: every operation takes `&mut self` and
/// runs to completion, including any blocking file I/O. Callers needing
/// shared access must provide their own exclusion around each call.
///
/// # Pin protocol
/// Every successful [`read_page`](BufMgr::read_page) or
/// [`alloc_page`](BufMgr::alloc_page) leaves the page pinned once and
/// must be paired with exactly one
/// [`unpin_page`](BufMgr::unpin_page). The `_pinned` variants return a
/// [`PinnedPage`] guard that releases the pin on drop instead.
pub struct BufMgr {
    /// Fixed pool of page-sized frames.
    pool: Box<[Page]>,
    /// Descriptor table, parallel to `pool`.
    descs: Box<[FrameDesc]>,
    /// Maps (file identity, page number) to the caching frame.
    page_table: PageTable,
    /// Rotating index into the descriptor table.
    clock_hand: usize,
    /// Diagnostic counters.
    stats: BufStats,
}

impl BufMgr {
    /// Create a buffer manager with `nframes` frames.
    ///
    /// # Panics
    /// Panics if `nframes` is 0.
    pub fn new(nframes: usize) -> Self {
        assert!(nframes > 0, "buffer pool needs at least one frame");

        let pool: Box<[Page]> = (0..nframes).map(|_| Page::new()).collect();
        let descs: Box<[FrameDesc]> = (0..nframes)
            .map(|i| FrameDesc::new(FrameId::new(i)))
            .collect();

        Self {
            pool,
            descs,
            page_table: PageTable::for_pool(nframes),
            // Start one behind frame 0 so the first advance lands there.
            clock_hand: nframes - 1,
            stats: BufStats::default(),
        }
    }

    // ========================================================================
    // Public protocol
    // ========================================================================

    /// Read a page through the cache, pinning its frame.
    ///
    /// On a hit the reference bit is set and the pin count incremented.
    /// On a miss a victim frame is evicted (written back first when
    /// dirty) and the page is loaded from `file`. Either way the page
    /// returns pinned; the caller owes one matching
    /// [`unpin_page`](BufMgr::unpin_page).
    ///
    /// # Errors
    /// - `BufferExceeded` if every frame is pinned
    /// - `PageNotFound` if `file` has no such page
    /// - errors surfaced by write-back of a dirty victim
    pub fn read_page(&mut self, file: &Arc<DbFile>, page_no: PageNumber) -> Result<&mut Page> {
        let frame = self.fetch_frame(file, page_no)?;
        Ok(&mut self.pool[frame.0])
    }

    /// Release one pin on a cached page.
    ///
    /// Unpinning a page that is not cached is a silent no-op. `dirty`
    /// is sticky: passing `false` never cleans a page that an earlier
    /// unpin marked dirty.
    ///
    /// # Errors
    /// - `PageNotPinned` if the page is cached but its pin count is 0
    pub fn unpin_page(&mut self, file: &DbFile, page_no: PageNumber, dirty: bool) -> Result<()> {
        let frame = match self.page_table.lookup(file.id(), page_no) {
            Some(frame) => frame,
            None => return Ok(()),
        };

        let desc = &mut self.descs[frame.0];
        if desc.pin_count == 0 {
            return Err(Error::PageNotPinned {
                file: file.filename(),
                page_no,
                frame_no: frame,
            });
        }
        desc.pin_count -= 1;
        if dirty {
            desc.dirty = true;
        }
        Ok(())
    }

    /// Allocate a fresh page in `file` and cache it, pinned.
    ///
    /// Returns the new page number together with the zeroed page, pinned
    /// once like [`read_page`](BufMgr::read_page).
    ///
    /// # Errors
    /// - `BufferExceeded` if every frame is pinned
    /// - I/O errors from on-disk allocation or victim write-back
    pub fn alloc_page(&mut self, file: &Arc<DbFile>) -> Result<(PageNumber, &mut Page)> {
        let (page_no, frame) = self.alloc_frame(file)?;
        Ok((page_no, &mut self.pool[frame.0]))
    }

    /// Delete a page from its file, discarding any cached copy.
    ///
    /// The cached copy is dropped without write-back; the on-disk slot
    /// is deallocated right after.
    ///
    /// # Errors
    /// - `PageNotFound` if `file` has no such page
    pub fn dispose_page(&mut self, file: &DbFile, page_no: PageNumber) -> Result<()> {
        if let Some(frame) = self.page_table.lookup(file.id(), page_no) {
            self.descs[frame.0].clear();
            self.page_table.remove(file.id(), page_no);
        }
        file.delete_page(page_no)
    }

    /// Write back and drop every cached page of `file`.
    ///
    /// Runs in two passes: a validation pass that touches nothing, then
    /// a commit pass that writes dirty pages and invalidates the frames.
    /// A failed validation therefore leaves the pool exactly as it was.
    ///
    /// # Errors
    /// - `PagePinned` if any frame of `file` is still pinned
    /// - `BadBuffer` if a valid frame of `file` carries the invalid
    ///   page number sentinel
    /// - I/O errors from write-back
    pub fn flush_file(&mut self, file: &DbFile) -> Result<()> {
        for desc in self.descs.iter() {
            if !desc.owned_by(file) {
                continue;
            }
            if desc.pin_count >= 1 {
                return Err(Error::PagePinned {
                    file: file.filename(),
                    page_no: desc.page_no,
                    frame_no: desc.frame_no,
                });
            }
            if !desc.page_no.is_valid() {
                return Err(Error::BadBuffer {
                    frame_no: desc.frame_no,
                    dirty: desc.dirty,
                    valid: desc.valid,
                    refbit: desc.refbit,
                });
            }
        }

        for i in 0..self.descs.len() {
            if !self.descs[i].owned_by(file) {
                continue;
            }
            if self.descs[i].dirty {
                file.write_page(&self.pool[i])?;
                self.descs[i].dirty = false;
                self.stats.pages_written += 1;
            }
            self.page_table.remove(file.id(), self.descs[i].page_no);
            self.descs[i].clear();
        }
        debug!("flushed {}", file.filename());
        Ok(())
    }

    /// Read a page through the cache, returning a guard that unpins on
    /// drop.
    ///
    /// The guard keeps the manager mutably borrowed for its lifetime,
    /// making the one-unpin-per-pin rule a compile-time property. Use
    /// the explicit protocol when several pages must stay pinned at
    /// once.
    pub fn read_page_pinned(
        &mut self,
        file: &Arc<DbFile>,
        page_no: PageNumber,
    ) -> Result<PinnedPage<'_>> {
        let frame = self.fetch_frame(file, page_no)?;
        Ok(PinnedPage::new(self, Arc::clone(file), page_no, frame))
    }

    /// Allocate a fresh page in `file`, returning a guard that unpins on
    /// drop.
    pub fn alloc_page_pinned(&mut self, file: &Arc<DbFile>) -> Result<PinnedPage<'_>> {
        let (page_no, frame) = self.alloc_frame(file)?;
        Ok(PinnedPage::new(self, Arc::clone(file), page_no, frame))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Number of frames in the pool.
    #[inline]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Pin count of a cached page, or `None` if it is not cached.
    pub fn pin_count(&self, file: &DbFile, page_no: PageNumber) -> Option<u32> {
        self.page_table
            .lookup(file.id(), page_no)
            .map(|frame| self.descs[frame.0].pin_count)
    }

    /// Whether the page is currently cached.
    pub fn contains_page(&self, file: &DbFile, page_no: PageNumber) -> bool {
        self.page_table.lookup(file.id(), page_no).is_some()
    }

    /// Number of frames holding a cached page.
    pub fn valid_frame_count(&self) -> usize {
        self.descs.iter().filter(|desc| desc.valid).count()
    }

    /// Number of pages currently mapped in the page table.
    pub fn cached_page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Diagnostic counters.
    #[inline]
    pub fn stats(&self) -> BufStats {
        self.stats
    }

    /// Dump every frame descriptor and the valid-frame count to stdout.
    pub fn print_self(&self) {
        println!("{}", self);
    }

    // ========================================================================
    // Internal: fetch and install
    // ========================================================================

    /// Locate or load the frame caching `(file, page_no)`, pinned.
    fn fetch_frame(&mut self, file: &Arc<DbFile>, page_no: PageNumber) -> Result<FrameId> {
        if let Some(frame) = self.page_table.lookup(file.id(), page_no) {
            let desc = &mut self.descs[frame.0];
            desc.refbit = true;
            desc.pin_count += 1;
            self.stats.cache_hits += 1;
            return Ok(frame);
        }

        self.stats.cache_misses += 1;
        let frame = self.alloc_buf()?;
        self.evict_frame(frame);

        let page = file.read_page(page_no)?;
        self.stats.pages_read += 1;

        self.pool[frame.0] = page;
        self.page_table.insert(file.id(), page_no, frame);
        self.descs[frame.0].set(Arc::clone(file), page_no);
        Ok(frame)
    }

    /// Allocate a page on disk and install it in a victim frame, pinned.
    fn alloc_frame(&mut self, file: &Arc<DbFile>) -> Result<(PageNumber, FrameId)> {
        let page = file.allocate_page()?;
        let page_no = page.page_number();

        let frame = self.alloc_buf()?;
        self.evict_frame(frame);

        self.pool[frame.0] = page;
        self.page_table.insert(file.id(), page_no, frame);
        self.descs[frame.0].set(Arc::clone(file), page_no);
        Ok((page_no, frame))
    }

    /// Drop the stale mapping of a victim frame and invalidate it.
    ///
    /// The entry may already be gone: a dirty victim's whole file was
    /// flushed during selection, which cleared the frame itself.
    fn evict_frame(&mut self, frame: FrameId) {
        if !self.descs[frame.0].valid {
            return;
        }
        let owner = self.descs[frame.0].file.clone();
        let old_page = self.descs[frame.0].page_no;
        if let Some(owner) = owner {
            self.page_table.remove(owner.id(), old_page);
        }
        self.descs[frame.0].clear();
    }

    // ========================================================================
    // Internal: clock replacement engine
    // ========================================================================

    /// Advance the clock hand one frame, wrapping at the pool size.
    fn advance_clock(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.descs.len();
    }

    /// Select a victim frame with the clock sweep.
    ///
    /// The returned frame may still be valid with a stale mapping;
    /// callers run [`evict_frame`](Self::evict_frame) before reuse.
    ///
    /// The up-front pin scan guarantees termination: with one unpinned
    /// frame in the pool, at most two revolutions select it (one to
    /// clear its reference bit, one to take it). It also keeps a fully
    /// pinned pool from perturbing the hand at all.
    fn alloc_buf(&mut self) -> Result<FrameId> {
        if self.descs.iter().all(|desc| desc.pin_count > 0) {
            return Err(Error::BufferExceeded);
        }

        loop {
            self.advance_clock();
            let hand = self.clock_hand;

            if !self.descs[hand].valid {
                // Empty slot wins immediately.
                return Ok(FrameId::new(hand));
            }
            if self.descs[hand].refbit {
                // Second chance: clear and move on.
                self.descs[hand].refbit = false;
                continue;
            }
            if self.descs[hand].pin_count >= 1 {
                continue;
            }

            self.stats.evictions += 1;
            if self.descs[hand].dirty {
                // Write-back goes through flush_file: every cached page
                // of the victim's file is flushed and dropped along
                // with the victim.
                if let Some(file) = self.descs[hand].file.clone() {
                    debug!(
                        "evicting dirty {} of {}",
                        self.descs[hand].page_no,
                        file.filename()
                    );
                    self.flush_file(&file)?;
                }
            }
            return Ok(FrameId::new(hand));
        }
    }

    #[cfg(test)]
    pub(crate) fn frame_desc(&self, frame: FrameId) -> &FrameDesc {
        &self.descs[frame.0]
    }

    pub(crate) fn frame_page(&self, frame: FrameId) -> &Page {
        &self.pool[frame.0]
    }

    pub(crate) fn frame_page_mut(&mut self, frame: FrameId) -> &mut Page {
        &mut self.pool[frame.0]
    }
}

impl fmt::Display for BufMgr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut valid_frames = 0;
        for (i, desc) in self.descs.iter().enumerate() {
            writeln!(f, "frame {}: {}", i, desc)?;
            if desc.valid {
                valid_frames += 1;
            }
        }
        write!(f, "total valid frames: {}", valid_frames)
    }
}

impl Drop for BufMgr {
    /// Write back whatever is still dirty at shutdown.
    ///
    /// Flush failures (a page left pinned, an I/O error) are logged and
    /// swallowed; a destructor has nowhere to surface them.
    fn drop(&mut self) {
        for i in 0..self.descs.len() {
            if !self.descs[i].dirty {
                continue;
            }
            if let Some(file) = self.descs[i].file.clone() {
                if let Err(err) = self.flush_file(&file) {
                    warn!("shutdown write-back of {} failed: {}", file.filename(), err);
                }
            }
        }
    }
}
