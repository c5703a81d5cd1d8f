//! Node offset type.

use std::fmt;

/// Identifies a node by its byte offset in the index file.
///
/// Offsets are the file's only pointers. A node is always fetched through the
/// store by offset and never held as a live reference across writes, since a
/// split may rewrite it on disk at any time.
///
/// Signed 64-bit so it maps directly onto the on-disk field, where `-1` marks
/// "no node" (unused child slots, end of the leaf chain).
///
/// # Example
/// ```
/// use bplusdb::NodeOffset;
///
/// let offset = NodeOffset::new(32);
/// assert!(offset.is_valid());
/// assert!(!NodeOffset::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeOffset(pub i64);

impl NodeOffset {
    /// Sentinel for "no node".
    pub const INVALID: NodeOffset = NodeOffset(-1);

    /// Create a new NodeOffset.
    #[inline]
    pub fn new(offset: i64) -> Self {
        NodeOffset(offset)
    }

    /// Check if this offset is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    pub fn into_option(self) -> Option<NodeOffset> {
        self.is_valid().then_some(self)
    }
}

impl Default for NodeOffset {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for NodeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Node(INVALID)")
        } else {
            write!(f, "Node(@{})", self.0)
        }
    }
}
