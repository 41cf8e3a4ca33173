//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a fixed-size byte block plus the number of the file slot
//! it came from. It is the unit of I/O between a [`DbFile`] and the
//! buffer pool frames.
//!
//! [`DbFile`]: crate::storage::DbFile

use crate::common::config::PAGE_SIZE;
use crate::common::PageNumber;

/// A page of data.
///
/// The data block is opaque to the storage and buffer layers; access
/// methods above them impose their own record formats. The page number
/// travels with the data so that a write can be routed back to the slot
/// the page was read from.
pub struct Page {
    page_no: PageNumber,
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page with the invalid sentinel number.
    #[inline]
    pub fn new() -> Self {
        Self {
            page_no: PageNumber::INVALID,
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Create a new zeroed page carrying the given number.
    #[inline]
    pub(crate) fn with_number(page_no: PageNumber) -> Self {
        Self {
            page_no,
            data: [0u8; PAGE_SIZE],
        }
    }

    /// The number of the file slot this page belongs to.
    #[inline]
    pub fn page_number(&self) -> PageNumber {
        self.page_no
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the page contents.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Size of a page in bytes.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
