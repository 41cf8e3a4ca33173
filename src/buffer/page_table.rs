//! Page table - the (file, page) to frame lookup structure.

use std::collections::HashMap;

use crate::common::{FrameId, PageNumber};
use crate::storage::FileId;

/// Maps `(file identity, page number)` to the frame caching that page.
///
/// An entry exists iff the named frame is valid and holds exactly that
/// page; the buffer manager maintains this in lockstep with the
/// descriptor table. Absence is an ordinary answer here, so lookups and
/// removals report it as `None` rather than an error.
pub(crate) struct PageTable {
    map: HashMap<(FileId, PageNumber), FrameId>,
}

impl PageTable {
    /// Create a table sized for a pool of `nframes` frames.
    ///
    /// Capacity is 1.2x the pool size so the load factor stays low even
    /// with every frame occupied.
    pub(crate) fn for_pool(nframes: usize) -> Self {
        Self {
            map: HashMap::with_capacity(nframes + nframes / 5 + 1),
        }
    }

    pub(crate) fn lookup(&self, file: FileId, page_no: PageNumber) -> Option<FrameId> {
        self.map.get(&(file, page_no)).copied()
    }

    pub(crate) fn insert(&mut self, file: FileId, page_no: PageNumber, frame: FrameId) {
        self.map.insert((file, page_no), frame);
    }

    /// Remove an entry, reporting whether it was present. Does not
    /// allocate or shrink.
    pub(crate) fn remove(&mut self, file: FileId, page_no: PageNumber) -> Option<FrameId> {
        self.map.remove(&(file, page_no))
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}
