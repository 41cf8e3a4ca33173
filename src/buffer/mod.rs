//! Buffer management.
//!
//! The buffer pool is the in-memory cache layer between access methods
//! and paged files. It manages a fixed pool of frames, each holding one
//! page of some open file.
//!
//! # Components
//! - [`BufMgr`] - The page cache and its clock replacement engine
//! - [`FrameDesc`] - Per-frame metadata (pin count, dirty, refbit)
//! - [`PinnedPage`] - RAII guard that unpins on drop
//! - [`BufStats`] - Diagnostic counters

mod buf_mgr;
mod frame_desc;
mod page_table;
mod pinned_page;
mod stats;

pub use buf_mgr::BufMgr;
pub use frame_desc::FrameDesc;
pub use pinned_page::PinnedPage;
pub use stats::BufStats;
