//! Error types for emberdb.

use std::fmt;

use crate::common::{FrameId, PageNumber};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write
/// `Result<T>`, the same pattern as `std::io::Result`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in emberdb.
///
/// A single crate-wide enum keeps error handling consistent across the
/// storage and buffer layers. Each variant carries enough context to
/// diagnose the failure: filename, page number and frame number where
/// relevant.
#[derive(Debug)]
pub enum Error {
    /// I/O error from disk operations.
    Io(std::io::Error),

    /// Every frame in the buffer pool is pinned; no victim can be chosen.
    BufferExceeded,

    /// A flush was requested for a file that still has a pinned page.
    PagePinned {
        file: String,
        page_no: PageNumber,
        frame_no: FrameId,
    },

    /// A valid frame carries the invalid page number sentinel.
    ///
    /// This should never arise unless a descriptor invariant has been
    /// violated elsewhere; the descriptor flags are carried for diagnosis.
    BadBuffer {
        frame_no: FrameId,
        dirty: bool,
        valid: bool,
        refbit: bool,
    },

    /// Attempted to unpin a cached page whose pin count is already zero.
    PageNotPinned {
        file: String,
        page_no: PageNumber,
        frame_no: FrameId,
    },

    /// The named page slot is not allocated in the file.
    PageNotFound { file: String, page_no: PageNumber },

    /// The file exists but does not carry an emberdb header.
    BadFileHeader { file: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::BufferExceeded => {
                write!(f, "buffer pool exceeded: all frames are pinned")
            }
            Error::PagePinned {
                file,
                page_no,
                frame_no,
            } => write!(
                f,
                "{} of file {} is pinned in {} and cannot be flushed",
                page_no, file, frame_no
            ),
            Error::BadBuffer {
                frame_no,
                dirty,
                valid,
                refbit,
            } => write!(
                f,
                "{} holds a bad buffer (dirty: {}, valid: {}, refbit: {})",
                frame_no, dirty, valid, refbit
            ),
            Error::PageNotPinned {
                file,
                page_no,
                frame_no,
            } => write!(
                f,
                "{} of file {} in {} is not pinned",
                page_no, file, frame_no
            ),
            Error::PageNotFound { file, page_no } => {
                write!(f, "{} not found in file {}", page_no, file)
            }
            Error::BadFileHeader { file } => {
                write!(f, "file {} has no valid emberdb header", file)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
