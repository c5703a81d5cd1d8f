//! Node store I/O statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for every record-level I/O the node store performs.
///
/// Atomic so they can be read through `&self` while the store is borrowed
/// elsewhere. `Ordering::Relaxed` is enough: counters are independent.
///
/// # Example
/// ```
/// use bplusdb::StoreStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = StoreStats::new();
/// stats.nodes_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().nodes_read, 1);
/// ```
#[derive(Debug)]
pub struct StoreStats {
    /// Node records read.
    pub nodes_read: AtomicU64,

    /// Existing node records rewritten in place.
    pub nodes_written: AtomicU64,

    /// New node records appended at end of file.
    pub nodes_appended: AtomicU64,

    /// Header rewrites (root changes).
    pub header_writes: AtomicU64,
}

impl StoreStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            nodes_read: AtomicU64::new(0),
            nodes_written: AtomicU64::new(0),
            nodes_appended: AtomicU64::new(0),
            header_writes: AtomicU64::new(0),
        }
    }

    /// Get a point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            nodes_read: self.nodes_read.load(Ordering::Relaxed),
            nodes_written: self.nodes_written.load(Ordering::Relaxed),
            nodes_appended: self.nodes_appended.load(Ordering::Relaxed),
            header_writes: self.header_writes.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.nodes_read.store(0, Ordering::Relaxed);
        self.nodes_written.store(0, Ordering::Relaxed);
        self.nodes_appended.store(0, Ordering::Relaxed);
        self.header_writes.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_read(&self) {
        self.nodes_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write(&self) {
        self.nodes_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_append(&self) {
        self.nodes_appended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_header_write(&self) {
        self.header_writes.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for StoreStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub nodes_read: u64,
    pub nodes_written: u64,
    pub nodes_appended: u64,
    pub header_writes: u64,
}

impl StatsSnapshot {
    /// Total record writes, in place or appended.
    pub fn total_writes(&self) -> u64 {
        self.nodes_written + self.nodes_appended
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ reads: {}, writes: {}, appends: {}, header_writes: {} }}",
            self.nodes_read, self.nodes_written, self.nodes_appended, self.header_writes
        )
    }
}
