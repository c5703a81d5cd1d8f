//! Structural verification.
//!
//! [`BPlusTree::verify`] walks the whole tree from the root and then the
//! whole leaf chain, and checks that the two views agree.

use std::collections::HashSet;

use crate::common::{Error, NodeOffset, Result};

use super::node::Node;
use super::pair::Pair;
use super::tree::BPlusTree;

/// Summary of a verified tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeShape {
    /// Levels from root to leaves.
    pub height: usize,
    pub leaf_count: usize,
    pub internal_count: usize,
    pub pair_count: usize,
}

/// Accumulated state of the root-down walk.
#[derive(Default)]
struct Walk {
    seen: HashSet<NodeOffset>,
    leaves: Vec<NodeOffset>,
    leaf_depth: Option<usize>,
    shape: TreeShape,
}

fn violation(msg: String) -> Error {
    Error::InvariantViolation(msg)
}

impl BPlusTree {
    /// Check every structural invariant.
    ///
    /// - Pairs within each node are in non-decreasing composite order
    /// - No stored node has reached the split threshold
    /// - Internal nodes have at least one separator and `count + 1` valid
    ///   children
    /// - Every subtree lies between the separators around it: left side
    ///   `<=` separator `<=` right side
    /// - All leaves are at the same depth
    /// - No node is reachable twice
    /// - The leaf chain visits exactly the tree's leaves, left to right
    ///
    /// # Errors
    /// Returns `Error::InvariantViolation` describing the first failure, or
    /// any I/O error hit while reading.
    pub fn verify(&mut self) -> Result<TreeShape> {
        let mut walk = Walk::default();
        self.verify_subtree(self.root(), 1, None, None, &mut walk)?;

        let mut chain = Vec::with_capacity(walk.leaves.len());
        let mut last: Option<Pair> = None;
        for leaf in self.leaves()? {
            let (offset, node) = leaf?;
            if let (Some(prev), Some(first)) = (last, node.pairs().first()) {
                if *first < prev {
                    return Err(violation(format!(
                        "leaf chain goes backwards at {}: {} after {}",
                        offset, first, prev
                    )));
                }
            }
            last = node.pairs().last().copied().or(last);
            chain.push(offset);
        }

        if chain != walk.leaves {
            return Err(violation(format!(
                "leaf chain has {} leaves, tree has {}, or their order differs",
                chain.len(),
                walk.leaves.len()
            )));
        }

        walk.shape.height = walk.leaf_depth.unwrap_or(1);
        walk.shape.leaf_count = walk.leaves.len();
        Ok(walk.shape)
    }

    fn verify_subtree(
        &mut self,
        offset: NodeOffset,
        depth: usize,
        lower: Option<Pair>,
        upper: Option<Pair>,
        walk: &mut Walk,
    ) -> Result<()> {
        if !walk.seen.insert(offset) {
            return Err(violation(format!("{} is reachable more than once", offset)));
        }

        let node = self.store.read(offset)?;
        self.verify_node(offset, &node, lower, upper)?;

        if node.is_leaf() {
            match walk.leaf_depth {
                None => walk.leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(violation(format!(
                        "leaf {} at depth {}, expected {}",
                        offset, depth, d
                    )));
                }
                Some(_) => {}
            }
            walk.leaves.push(offset);
            walk.shape.pair_count += node.count();
            return Ok(());
        }

        walk.shape.internal_count += 1;
        for (i, &child) in node.children().iter().enumerate() {
            let child_lower = if i == 0 { lower } else { Some(node.pairs()[i - 1]) };
            let child_upper = node.pairs().get(i).copied().or(upper);
            self.verify_subtree(child, depth + 1, child_lower, child_upper, walk)?;
        }
        Ok(())
    }

    fn verify_node(
        &self,
        offset: NodeOffset,
        node: &Node,
        lower: Option<Pair>,
        upper: Option<Pair>,
    ) -> Result<()> {
        let pairs = node.pairs();

        if node.count() >= self.config().split_threshold() {
            return Err(violation(format!(
                "{} holds {} pairs, split threshold is {}",
                offset,
                node.count(),
                self.config().split_threshold()
            )));
        }

        if let Some(w) = pairs.windows(2).find(|w| w[0] > w[1]) {
            return Err(violation(format!("{} is unsorted: {} before {}", offset, w[0], w[1])));
        }

        if let (Some(lower), Some(first)) = (lower, pairs.first()) {
            if *first < lower {
                return Err(violation(format!("{} has {} below bound {}", offset, first, lower)));
            }
        }
        if let (Some(upper), Some(last)) = (upper, pairs.last()) {
            if *last > upper {
                return Err(violation(format!("{} has {} above bound {}", offset, last, upper)));
            }
        }

        if !node.is_leaf() {
            if node.is_empty() {
                return Err(violation(format!("internal {} has no separators", offset)));
            }
            if node.children().len() != node.count() + 1 {
                return Err(violation(format!(
                    "internal {} has {} children for {} separators",
                    offset,
                    node.children().len(),
                    node.count()
                )));
            }
            if let Some(bad) = node.children().iter().find(|c| !c.is_valid()) {
                return Err(violation(format!("internal {} has child {}", offset, bad)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAIR_SIZE;
    use crate::common::TreeConfig;
    use crate::index::btree::Key;
    use tempfile::{tempdir, TempDir};

    fn small_tree() -> (BPlusTree, TempDir) {
        let dir = tempdir().unwrap();
        let config = TreeConfig::with_capacity(4).unwrap().sync_writes(false);
        let tree = BPlusTree::create(dir.path().join("test.idx"), config).unwrap();
        (tree, dir)
    }

    #[test]
    fn test_verify_empty_tree() {
        let (mut tree, _dir) = small_tree();
        assert_eq!(
            tree.verify().unwrap(),
            TreeShape {
                height: 1,
                leaf_count: 1,
                internal_count: 0,
                pair_count: 0,
            }
        );
    }

    #[test]
    fn test_verify_counts_match() {
        let (mut tree, _dir) = small_tree();
        for i in 0..50 {
            tree.insert(&format!("key{:03}", i), i).unwrap();
        }

        let shape = tree.verify().unwrap();
        assert_eq!(shape.pair_count, 50);
        assert_eq!(shape.height, tree.height().unwrap());
        assert_eq!(shape.leaf_count, tree.leaves().unwrap().count());
        assert_eq!(
            (shape.leaf_count + shape.internal_count) as u64,
            tree.node_count()
        );
    }

    #[test]
    fn test_verify_detects_unsorted_leaf() {
        let (mut tree, _dir) = small_tree();
        tree.insert("a", 1).unwrap();
        tree.insert("b", 2).unwrap();

        // Swap the two pair slots in the encoded root leaf
        let root = tree.root();
        let leaf = tree.store.read(root).unwrap();
        let mut buf = vec![0u8; tree.config().record_size()];
        leaf.encode(&mut buf);
        let (a, b) = buf[5..5 + 2 * PAIR_SIZE].split_at_mut(PAIR_SIZE);
        a.swap_with_slice(b);

        let bad = Node::decode(&buf, 4).unwrap();
        assert_eq!(bad.pairs()[0].key, Key::new("b").unwrap());
        tree.store.write(root, &bad).unwrap();

        assert!(matches!(tree.verify(), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_verify_detects_broken_chain() {
        let (mut tree, _dir) = small_tree();
        for i in 0..12 {
            tree.insert(&format!("k{:02}", i), i).unwrap();
        }
        tree.verify().unwrap();

        // Cut the chain after the first leaf
        let first = tree.leftmost_leaf().unwrap();
        let mut leaf = tree.store.read(first).unwrap();
        leaf.set_next(NodeOffset::INVALID);
        tree.store.write(first, &leaf).unwrap();

        assert!(matches!(tree.verify(), Err(Error::InvariantViolation(_))));
    }
}
