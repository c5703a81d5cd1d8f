//! B+tree node: a fixed-capacity record with an explicit live count.
//!
//! Slots are pre-allocated to the configured capacity and never grow.
//! Only the first `count` pairs are meaningful, and for internal nodes only
//! the first `count + 1` children. Unused slots hold [`Pair::EMPTY`] and
//! [`NodeOffset::INVALID`] so a node always serializes to the same bytes.
//!
//! # Record layout (little-endian)
//! ```text
//! is_leaf   u8                      1 = leaf, 0 = internal
//! count     i32                     live pairs
//! pairs     capacity × (key, value) key: [u8; 65] null-padded, value: i32
//! children  (capacity + 1) × i64    -1 in leaves and unused slots
//! next      i64                     right sibling leaf, -1 if none
//! ```

use crate::common::config::{record_size, KEY_FIELD_SIZE, PAIR_SIZE};
use crate::common::NodeOffset;

use super::pair::{Key, Pair};

/// A leaf or internal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    is_leaf: bool,
    count: usize,
    pairs: Vec<Pair>,
    children: Vec<NodeOffset>,
    next: NodeOffset,
}

impl Node {
    /// An empty leaf with no right sibling.
    pub fn new_leaf(capacity: usize) -> Self {
        Self::empty(true, capacity)
    }

    /// An empty internal node.
    pub fn new_internal(capacity: usize) -> Self {
        Self::empty(false, capacity)
    }

    /// A root for a tree that just grew a level: one separator, two children.
    pub fn new_root(capacity: usize, left: NodeOffset, separator: Pair, right: NodeOffset) -> Self {
        let mut root = Self::new_internal(capacity);
        root.pairs[0] = separator;
        root.children[0] = left;
        root.children[1] = right;
        root.count = 1;
        root
    }

    fn empty(is_leaf: bool, capacity: usize) -> Self {
        Self {
            is_leaf,
            count: 0,
            pairs: vec![Pair::EMPTY; capacity],
            children: vec![NodeOffset::INVALID; capacity + 1],
            next: NodeOffset::INVALID,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Number of live pairs.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of pair slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pairs.len()
    }

    /// Live pairs, ascending by composite order.
    #[inline]
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs[..self.count]
    }

    /// Live children (`count + 1` of them). Empty for leaves.
    pub fn children(&self) -> &[NodeOffset] {
        if self.is_leaf {
            &[]
        } else {
            &self.children[..=self.count]
        }
    }

    #[inline]
    pub fn child(&self, index: usize) -> NodeOffset {
        self.children()[index]
    }

    /// Right sibling in the leaf chain.
    #[inline]
    pub fn next(&self) -> NodeOffset {
        self.next
    }

    #[inline]
    pub fn set_next(&mut self, next: NodeOffset) {
        self.next = next;
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Number of live pairs `<= pair`.
    ///
    /// As a child index this routes equal pairs to the right.
    pub fn upper_bound(&self, pair: &Pair) -> usize {
        self.pairs().partition_point(|p| p <= pair)
    }

    /// Number of live pairs `< pair`.
    ///
    /// As a child index this routes to the leftmost subtree that can still
    /// hold `pair`.
    pub fn lower_bound(&self, pair: &Pair) -> usize {
        self.pairs().partition_point(|p| p < pair)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert a pair into a leaf at its sorted position (after any equal pairs).
    ///
    /// Returns the slot index used.
    ///
    /// # Panics
    /// Panics if every slot is in use.
    pub fn insert_pair(&mut self, pair: Pair) -> usize {
        assert!(self.count < self.capacity(), "node is full");

        let pos = self.upper_bound(&pair);
        self.pairs.copy_within(pos..self.count, pos + 1);
        self.pairs[pos] = pair;
        self.count += 1;
        pos
    }

    /// Insert a separator promoted from the child at `child_index`.
    ///
    /// The split child keeps its slot and `right` lands just after it.
    ///
    /// # Panics
    /// Panics if every slot is in use or `child_index > count`.
    pub fn insert_child_at(&mut self, child_index: usize, separator: Pair, right: NodeOffset) {
        assert!(!self.is_leaf, "leaves have no children");
        assert!(self.count < self.capacity(), "node is full");
        assert!(child_index <= self.count, "child index out of range");

        self.pairs.copy_within(child_index..self.count, child_index + 1);
        self.pairs[child_index] = separator;
        self.children
            .copy_within(child_index + 1..=self.count, child_index + 2);
        self.children[child_index + 1] = right;
        self.count += 1;
    }

    /// Remove and return the pair at `index`, shifting the rest left.
    ///
    /// # Panics
    /// Panics if `index >= count`.
    pub fn remove_at(&mut self, index: usize) -> Pair {
        assert!(index < self.count, "pair index out of range");

        let removed = self.pairs[index];
        self.pairs.copy_within(index + 1..self.count, index);
        self.count -= 1;
        self.pairs[self.count] = Pair::EMPTY;
        removed
    }

    /// Split a leaf at `count / 2`.
    ///
    /// Pairs `[mid, count)` move to the returned right leaf, which inherits
    /// this leaf's `next`. The caller links `self.next` to the right leaf once
    /// it has an offset. The right leaf's first pair is the separator.
    pub fn split_leaf(&mut self) -> Node {
        debug_assert!(self.is_leaf);

        let mid = self.count / 2;
        let mut right = Node::new_leaf(self.capacity());
        let moved = self.count - mid;

        right.pairs[..moved].copy_from_slice(&self.pairs[mid..self.count]);
        right.count = moved;
        right.next = self.next;

        self.pairs[mid..self.count].fill(Pair::EMPTY);
        self.count = mid;
        right
    }

    /// Split an internal node at `count / 2`.
    ///
    /// The separator at `mid` is removed from both halves and returned for
    /// promotion. This node keeps pairs `[0, mid)` and children `[0, mid]`;
    /// the returned right node gets pairs `(mid, count)` and children
    /// `[mid + 1, count]`.
    pub fn split_internal(&mut self) -> (Pair, Node) {
        debug_assert!(!self.is_leaf);

        let mid = self.count / 2;
        let separator = self.pairs[mid];
        let mut right = Node::new_internal(self.capacity());
        let moved = self.count - mid - 1;

        right.pairs[..moved].copy_from_slice(&self.pairs[mid + 1..self.count]);
        right.children[..=moved].copy_from_slice(&self.children[mid + 1..=self.count]);
        right.count = moved;

        self.pairs[mid..self.count].fill(Pair::EMPTY);
        self.children[mid + 1..=self.count].fill(NodeOffset::INVALID);
        self.count = mid;
        (separator, right)
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize into `buf`, which must be exactly one record long.
    ///
    /// # Panics
    /// Panics if `buf.len() != record_size(capacity)`.
    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), record_size(self.capacity()), "record buffer size");

        buf[0] = u8::from(self.is_leaf);
        buf[1..5].copy_from_slice(&(self.count as i32).to_le_bytes());

        let mut pos = 5;
        for pair in &self.pairs {
            buf[pos..pos + KEY_FIELD_SIZE].copy_from_slice(pair.key.field());
            buf[pos + KEY_FIELD_SIZE..pos + PAIR_SIZE].copy_from_slice(&pair.value.to_le_bytes());
            pos += PAIR_SIZE;
        }
        for child in &self.children {
            buf[pos..pos + 8].copy_from_slice(&child.0.to_le_bytes());
            pos += 8;
        }
        buf[pos..pos + 8].copy_from_slice(&self.next.0.to_le_bytes());
    }

    /// Parse one record.
    ///
    /// Returns a description of the problem if the bytes can't be a node of
    /// this capacity, including a count at or above the split threshold.
    pub(crate) fn decode(buf: &[u8], capacity: usize) -> std::result::Result<Node, String> {
        if buf.len() != record_size(capacity) {
            return Err(format!(
                "record is {} bytes, expected {}",
                buf.len(),
                record_size(capacity)
            ));
        }

        let is_leaf = match buf[0] {
            0 => false,
            1 => true,
            other => return Err(format!("bad leaf flag {}", other)),
        };

        // Stored nodes are always below the split threshold, so a full slot
        // array can only come from a damaged record.
        let count = i32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let threshold = capacity - 1;
        if count < 0 || count as usize >= threshold {
            return Err(format!("count {} outside 0..{}", count, threshold));
        }
        let count = count as usize;

        let mut node = Node::empty(is_leaf, capacity);
        node.count = count;

        let mut pos = 5;
        for slot in 0..capacity {
            if slot < count {
                let key = Key::from_field(&buf[pos..pos + KEY_FIELD_SIZE])
                    .ok_or_else(|| format!("unterminated key in slot {}", slot))?;
                let value = read_i32(&buf[pos + KEY_FIELD_SIZE..pos + PAIR_SIZE]);
                node.pairs[slot] = Pair::new(key, value);
            }
            pos += PAIR_SIZE;
        }
        for slot in 0..=capacity {
            node.children[slot] = NodeOffset::new(read_i64(&buf[pos..pos + 8]));
            pos += 8;
        }
        node.next = NodeOffset::new(read_i64(&buf[pos..pos + 8]));

        Ok(node)
    }
}

fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    i32::from_le_bytes(raw)
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(raw)
}

// ============================================================================
// TESTS
// ============================================================================
