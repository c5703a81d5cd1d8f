//! Leaf chain traversal.
//!
//! Every leaf stores the offset of its right sibling, so the leaves form a
//! singly linked list in ascending composite order. Scans that cross leaf
//! boundaries (duplicate keys, ranges, full iteration) walk this list
//! instead of going back through the internal nodes.

use crate::common::{Error, NodeOffset, Result};
use crate::storage::NodeStore;

use super::node::Node;
use super::pair::{Key, Pair};
use super::tree::BPlusTree;

/// Iterator over leaves in chain order, yielding `(offset, leaf)`.
///
/// Stops after the first error. A chain longer than the file's node count
/// must contain a cycle and is reported as corruption.
pub struct LeafChain<'a> {
    store: &'a mut NodeStore,
    next: NodeOffset,
    visited: u64,
}

impl<'a> LeafChain<'a> {
    pub(crate) fn new(store: &'a mut NodeStore, start: NodeOffset) -> Self {
        Self {
            store,
            next: start,
            visited: 0,
        }
    }

    fn fetch(&mut self, offset: NodeOffset) -> Result<Node> {
        self.visited += 1;
        if self.visited > self.store.node_count() {
            return Err(Error::CorruptNode {
                offset: offset.0,
                reason: "leaf chain revisits a node".to_string(),
            });
        }

        let node = self.store.read(offset)?;
        if !node.is_leaf() {
            return Err(Error::CorruptNode {
                offset: offset.0,
                reason: "leaf chain points at an internal node".to_string(),
            });
        }
        Ok(node)
    }
}

impl Iterator for LeafChain<'_> {
    type Item = Result<(NodeOffset, Node)>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next.into_option()?;
        match self.fetch(offset) {
            Ok(leaf) => {
                self.next = leaf.next();
                Some(Ok((offset, leaf)))
            }
            Err(e) => {
                self.next = NodeOffset::INVALID;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over stored pairs in ascending composite order.
///
/// Optionally bounded below by a pair and above by an exclusive key.
pub struct Pairs<'a> {
    chain: LeafChain<'a>,
    leaf: Option<Node>,
    pos: usize,
    lower: Option<Pair>,
    upper: Option<Key>,
    done: bool,
}

impl<'a> Pairs<'a> {
    fn new(chain: LeafChain<'a>, lower: Option<Pair>, upper: Option<Key>) -> Self {
        Self {
            chain,
            leaf: None,
            pos: 0,
            lower,
            upper,
            done: false,
        }
    }
}

impl Iterator for Pairs<'_> {
    type Item = Result<Pair>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(leaf) = &self.leaf {
                if let Some(&pair) = leaf.pairs().get(self.pos) {
                    self.pos += 1;
                    if self.lower.is_some_and(|lower| pair < lower) {
                        continue;
                    }
                    if self.upper.is_some_and(|upper| pair.key >= upper) {
                        self.done = true;
                        return None;
                    }
                    return Some(Ok(pair));
                }
            }

            match self.chain.next() {
                Some(Ok((_, leaf))) => {
                    self.leaf = Some(leaf);
                    self.pos = 0;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => self.done = true,
            }
        }
        None
    }
}

impl BPlusTree {
    /// Every leaf, left to right.
    pub fn leaves(&mut self) -> Result<LeafChain<'_>> {
        let start = self.leftmost_leaf()?;
        Ok(LeafChain::new(&mut self.store, start))
    }

    /// Every stored pair in ascending `(key, value)` order.
    ///
    /// # Example
    /// ```no_run
    /// # use bplusdb::{BPlusTree, TreeConfig};
    /// let mut tree = BPlusTree::open("fruit.idx").unwrap();
    /// for pair in tree.iter().unwrap() {
    ///     let pair = pair.unwrap();
    ///     println!("{} => {}", pair.key, pair.value);
    /// }
    /// ```
    pub fn iter(&mut self) -> Result<Pairs<'_>> {
        let start = self.leftmost_leaf()?;
        Ok(Pairs::new(LeafChain::new(&mut self.store, start), None, None))
    }

    /// Pairs whose key `k` satisfies `start <= k < end`, ascending.
    ///
    /// # Errors
    /// Returns key validation errors for either bound.
    pub fn range(&mut self, start: &str, end: &str) -> Result<Pairs<'_>> {
        let lower = Pair::lowest(Key::new(start)?);
        let upper = Key::new(end)?;
        let (leaf, _) = self.descend_lower(&lower)?;
        Ok(Pairs::new(
            LeafChain::new(&mut self.store, leaf),
            Some(lower),
            Some(upper),
        ))
    }

    /// Number of stored pairs. Walks the whole leaf chain.
    pub fn len(&mut self) -> Result<usize> {
        let mut total = 0;
        for leaf in self.leaves()? {
            total += leaf?.1.count();
        }
        Ok(total)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        for leaf in self.leaves()? {
            if !leaf?.1.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
