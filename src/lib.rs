//! emberdb - a disk-oriented storage engine core.
//!
//! The crate pairs paged files with a clock buffer pool:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              access methods (callers)                │
//! └──────────────────────────┬───────────────────────────┘
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                 Buffer layer (buffer/)               │
//! │     BufMgr + FrameDesc + PinnedPage + BufStats       │
//! │            clock second-chance replacement           │
//! └──────────────────────────┬───────────────────────────┘
//!                            ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                Storage layer (storage/)              │
//! │        DbFile (paged file, free list) + Page         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every page read or write funnels through [`BufMgr`]: clients name a
//! page as `(file, page number)`, pin it while working on it, and unpin
//! it with a dirty flag when done. Dirty pages are written back when
//! their frame is reclaimed, when the file is flushed, or at shutdown.
//!
//! # Quick start
//! ```no_run
//! use std::sync::Arc;
//! use emberdb::{BufMgr, DbFile};
//!
//! let file = Arc::new(DbFile::create("data.db").unwrap());
//! let mut bufmgr = BufMgr::new(64);
//!
//! let (page_no, page) = bufmgr.alloc_page(&file).unwrap();
//! page.as_mut_slice()[..5].copy_from_slice(b"hello");
//! bufmgr.unpin_page(&file, page_no, true).unwrap();
//!
//! bufmgr.flush_file(&file).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use buffer::{BufMgr, BufStats, FrameDesc, PinnedPage};
pub use common::config::PAGE_SIZE;
pub use common::{Error, FrameId, PageNumber, Result};
pub use storage::{DbFile, FileId, Page};
