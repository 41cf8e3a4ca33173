//! Buffer pool statistics tracking.

use std::fmt;

/// Counters tracked by the buffer manager.
///
/// Plain integers, updated inline by the single-threaded manager.
/// Diagnostic only; nothing in the replacement policy reads them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufStats {
    /// Times a requested page was found in the pool.
    pub cache_hits: u64,
    /// Times a requested page had to come from its file.
    pub cache_misses: u64,
    /// Valid frames handed out as victims.
    pub evictions: u64,
    /// Pages read from files.
    pub pages_read: u64,
    /// Pages written back to files.
    pub pages_written: u64,
}

impl BufStats {
    /// Cache hit rate in `[0.0, 1.0]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for BufStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stats {{ hits: {}, misses: {}, evictions: {}, reads: {}, writes: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}
