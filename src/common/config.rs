//! Configuration for bplusdb.
//!
//! The on-disk format is derived from a handful of constants. A node's pair
//! capacity is the only tunable that changes the record layout, and it is
//! fixed for the lifetime of a file.

use crate::common::{Error, Result};

/// Target size of one node record in bytes (4KB).
///
/// Capacity is derived so that a full record fits in this budget, which keeps
/// every node inside a single OS page.
pub const NODE_BUDGET_BYTES: usize = 4096;

/// Maximum length of a key in bytes.
pub const MAX_KEY_LEN: usize = 64;

/// Size of the on-disk key field (null-padded, always room for a terminator).
pub const KEY_FIELD_SIZE: usize = MAX_KEY_LEN + 1;

/// Size of one serialized pair: key field + i32 value.
pub const PAIR_SIZE: usize = KEY_FIELD_SIZE + 4;

/// Size of one serialized child offset.
pub const CHILD_SIZE: usize = 8;

/// Smallest usable capacity.
///
/// Nodes split once they hold `capacity - 1` pairs. Below 4 an internal split
/// would leave the right half with no separator at all.
pub const MIN_CAPACITY: usize = 4;

/// Size of the file header that precedes the first node record.
pub const FILE_HEADER_SIZE: usize = 32;

/// Bytes of a record that don't scale with capacity:
/// is_leaf (1) + count (4) + next (8) + the extra child slot (8).
const FIXED_OVERHEAD: usize = 1 + 4 + 8 + CHILD_SIZE;

/// Capacity that fits one record in [`NODE_BUDGET_BYTES`].
pub const DEFAULT_CAPACITY: usize = (NODE_BUDGET_BYTES - FIXED_OVERHEAD) / (PAIR_SIZE + CHILD_SIZE);

/// Largest record a file may declare (1MB).
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Largest usable capacity: one record must fit in [`MAX_RECORD_BYTES`].
pub const MAX_CAPACITY: usize = (MAX_RECORD_BYTES - FIXED_OVERHEAD) / (PAIR_SIZE + CHILD_SIZE);

/// Tree configuration.
///
/// # Example
/// ```
/// use bplusdb::TreeConfig;
///
/// let config = TreeConfig::default();
/// assert_eq!(config.capacity(), 52);
/// assert!(config.record_size() <= 4096);
///
/// let small = TreeConfig::with_capacity(4).unwrap();
/// assert_eq!(small.split_threshold(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    capacity: usize,
    /// Call `sync_data()` after every store write.
    pub sync_writes: bool,
}

impl TreeConfig {
    /// Create a config with an explicit pair capacity.
    ///
    /// # Errors
    /// Returns `Error::InvalidCapacity` unless
    /// `MIN_CAPACITY <= capacity <= MAX_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            capacity,
            sync_writes: true,
        })
    }

    /// Builder-style toggle for write syncing.
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Number of pair slots per node.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pair count at which a node is split.
    #[inline]
    pub fn split_threshold(&self) -> usize {
        self.capacity - 1
    }

    /// Size in bytes of one serialized node.
    #[inline]
    pub fn record_size(&self) -> usize {
        record_size(self.capacity)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sync_writes: true,
        }
    }
}

/// Size in bytes of a node record with the given capacity.
///
/// # Layout
/// ```text
/// is_leaf  u8
/// count    i32
/// pairs    capacity × (key [u8; 65], value i32)
/// children (capacity + 1) × i64
/// next     i64
/// ```
pub const fn record_size(capacity: usize) -> usize {
    1 + 4 + capacity * PAIR_SIZE + (capacity + 1) * CHILD_SIZE + 8
}
