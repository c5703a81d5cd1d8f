//! B+tree engine.
//!
//! Insert, remove and find over a [`NodeStore`]. Nodes are fetched by
//! offset for every step and written back explicitly; no node copy is kept
//! across a write to some other node.

use std::path::Path;

use tracing::{debug, info};

use crate::common::{Error, NodeOffset, Result, TreeConfig};
use crate::storage::{NodeStore, StatsSnapshot};

use super::node::Node;
use super::pair::{Key, Pair};

/// One step of a root-to-leaf descent: the node visited and the child taken.
///
/// Insert records these on the way down so a split can be pushed into its
/// parent without searching for it; nodes carry no parent pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathEntry {
    offset: NodeOffset,
    child_index: usize,
}

/// Split activity since the tree was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounters {
    pub leaf_splits: u64,
    pub internal_splits: u64,
    /// Splits of the root node; each one adds a level.
    pub root_splits: u64,
}

/// A disk-resident B+tree of `(key, value)` pairs.
///
/// Keys may repeat; each `(key, value)` is its own entry, ordered by key and
/// then by value. Inserting the same pair twice stores it twice.
///
/// # Operating assumptions
/// - Single-threaded: every method takes `&mut self` and runs to completion.
///   Nothing guards against a second handle or process on the same file.
/// - A crash between the writes of one split can leave the file
///   inconsistent. There is no journal.
/// - Removal never merges or rebalances; emptied nodes stay in place.
///
/// # Example
/// ```no_run
/// use bplusdb::{BPlusTree, TreeConfig};
///
/// let mut tree = BPlusTree::create("fruit.idx", TreeConfig::default()).unwrap();
/// tree.insert("apple", 1).unwrap();
/// tree.insert("banana", 2).unwrap();
/// tree.insert("apple", 3).unwrap();
///
/// assert_eq!(tree.find("apple").unwrap(), vec![1, 3]);
/// assert!(tree.find("cherry").unwrap().is_empty());
/// ```
pub struct BPlusTree {
    pub(crate) store: NodeStore,
    counters: SplitCounters,
}

impl BPlusTree {
    /// Create a new index file with an empty root leaf.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        Self::init(NodeStore::create(path, config)?)
    }

    /// Open an existing index file.
    ///
    /// Node capacity is read from the file header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_sync(path, true)
    }

    /// Open an existing index file, choosing whether writes are synced.
    pub fn open_with_sync<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        Self::init(NodeStore::open(path, sync_writes)?)
    }

    /// Open the index at `path`, creating it if it doesn't exist.
    ///
    /// # Errors
    /// Returns `Error::CapacityMismatch` if the existing file uses a
    /// different node capacity.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        Self::init(NodeStore::open_or_create(path, config)?)
    }

    /// Wrap a store, giving it a root leaf if it has none yet.
    ///
    /// A file with a header but no nodes is what a crash during `create`
    /// leaves behind; it is treated as empty.
    fn init(mut store: NodeStore) -> Result<Self> {
        if !store.root().is_valid() {
            if store.node_count() != 0 {
                return Err(Error::InvariantViolation(format!(
                    "file has {} nodes but no root",
                    store.node_count()
                )));
            }
            let root = store.append(&Node::new_leaf(store.config().capacity()))?;
            store.set_root(root)?;
            info!(root = root.0, "initialized empty tree");
        }

        Ok(Self {
            store,
            counters: SplitCounters::default(),
        })
    }

    // ========================================================================
    // Public API
    // ========================================================================

    /// Insert `(key, value)`.
    ///
    /// Duplicates are kept: inserting an existing pair adds another copy.
    ///
    /// # Errors
    /// - `Error::KeyTooLong` / `Error::InvalidKey` for unrepresentable keys
    /// - Any I/O error, which aborts the insert midway
    pub fn insert(&mut self, key: &str, value: i32) -> Result<()> {
        self.insert_pair(Pair::new(Key::new(key)?, value))
    }

    /// Remove one occurrence of `(key, value)`.
    ///
    /// Returns `false` (and changes nothing) if the pair isn't stored.
    /// Leaves are only ever shrunk; underfull nodes are not merged.
    pub fn remove(&mut self, key: &str, value: i32) -> Result<bool> {
        self.remove_pair(&Pair::new(Key::new(key)?, value))
    }

    /// All values stored under `key`, ascending. Empty if there are none.
    pub fn find(&mut self, key: &str) -> Result<Vec<i32>> {
        let key = Key::new(key)?;
        let (_, mut leaf) = self.descend_lower(&Pair::lowest(key))?;

        // Equal keys may continue into later leaves. The chain is globally
        // ordered, so the first larger key ends the scan.
        let mut values = Vec::new();
        let mut steps = 1;
        loop {
            for pair in leaf.pairs() {
                if pair.key == key {
                    values.push(pair.value);
                } else if pair.key > key {
                    return Ok(values);
                }
            }

            let next = leaf.next();
            if !next.is_valid() {
                return Ok(values);
            }
            steps += 1;
            self.check_walk(steps, next)?;
            leaf = self.store.read(next)?;
        }
    }

    /// Number of levels; 1 while the root is a leaf.
    pub fn height(&mut self) -> Result<usize> {
        let mut node = self.store.read(self.root())?;
        let mut height = 1;
        while !node.is_leaf() {
            let child = node.child(0);
            height += 1;
            self.check_walk(height as u64, child)?;
            node = self.store.read(child)?;
        }
        Ok(height)
    }

    /// Offset of the current root node.
    #[inline]
    pub fn root(&self) -> NodeOffset {
        self.store.root()
    }

    /// Tree configuration (capacity and sync mode).
    #[inline]
    pub fn config(&self) -> &TreeConfig {
        self.store.config()
    }

    /// Splits performed through this handle.
    #[inline]
    pub fn split_counters(&self) -> SplitCounters {
        self.counters
    }

    /// I/O counters of the underlying store.
    #[inline]
    pub fn store_stats(&self) -> StatsSnapshot {
        self.store.stats().snapshot()
    }

    /// Number of node records in the file, including emptied ones.
    #[inline]
    pub fn node_count(&self) -> u64 {
        self.store.node_count()
    }

    // ========================================================================
    // Descent
    // ========================================================================

    /// Descend to the leftmost leaf that could contain `probe`.
    ///
    /// Everything in earlier leaves is strictly less than `probe`.
    pub(crate) fn descend_lower(&mut self, probe: &Pair) -> Result<(NodeOffset, Node)> {
        let mut offset = self.root();
        let mut node = self.store.read(offset)?;
        let mut depth = 1;
        while !node.is_leaf() {
            offset = node.child(node.lower_bound(probe));
            depth += 1;
            self.check_walk(depth, offset)?;
            node = self.store.read(offset)?;
        }
        Ok((offset, node))
    }

    /// Offset of the first leaf in the chain.
    pub(crate) fn leftmost_leaf(&mut self) -> Result<NodeOffset> {
        let mut offset = self.root();
        let mut node = self.store.read(offset)?;
        let mut depth = 1;
        while !node.is_leaf() {
            offset = node.child(0);
            depth += 1;
            self.check_walk(depth, offset)?;
            node = self.store.read(offset)?;
        }
        Ok(offset)
    }

    /// Fail a walk that has taken more steps than there are nodes.
    ///
    /// Neither a root-to-leaf path nor a leaf chain visits a node twice, so
    /// `steps > node_count` means a child or `next` pointer forms a cycle.
    fn check_walk(&self, steps: u64, offset: NodeOffset) -> Result<()> {
        if steps > self.store.node_count() {
            return Err(Error::CorruptNode {
                offset: offset.0,
                reason: "walk revisits a node".to_string(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Insert
    // ========================================================================

    fn insert_pair(&mut self, pair: Pair) -> Result<()> {
        // Internal routing uses the real value, so an equal pair goes to the
        // child already holding equal-or-greater entries.
        let mut path = Vec::new();
        let mut offset = self.root();
        let mut node = self.store.read(offset)?;
        while !node.is_leaf() {
            let child_index = node.upper_bound(&pair);
            path.push(PathEntry {
                offset,
                child_index,
            });
            offset = node.child(child_index);
            self.check_walk(path.len() as u64 + 1, offset)?;
            node = self.store.read(offset)?;
        }

        node.insert_pair(pair);
        if node.count() < self.config().split_threshold() {
            return self.store.write(offset, &node);
        }
        self.split(offset, node, path)
    }

    /// Split `node` (already holding its new entry) and push separators up
    /// `path` until some ancestor has room or a new root is made.
    ///
    /// The left half always keeps `offset`; the right half is appended.
    fn split(
        &mut self,
        mut offset: NodeOffset,
        mut node: Node,
        mut path: Vec<PathEntry>,
    ) -> Result<()> {
        loop {
            let (separator, right_offset) = if node.is_leaf() {
                let right = node.split_leaf();
                let separator = right.pairs()[0];
                let right_offset = self.store.append(&right)?;
                node.set_next(right_offset);
                self.store.write(offset, &node)?;
                self.counters.leaf_splits += 1;
                (separator, right_offset)
            } else {
                let (separator, right) = node.split_internal();
                let right_offset = self.store.append(&right)?;
                self.store.write(offset, &node)?;
                self.counters.internal_splits += 1;
                (separator, right_offset)
            };

            debug!(
                left = offset.0,
                right = right_offset.0,
                leaf = node.is_leaf(),
                separator = %separator,
                "split node"
            );

            let Some(parent) = path.pop() else {
                return self.grow_root(offset, separator, right_offset);
            };

            let mut parent_node = self.store.read(parent.offset)?;
            parent_node.insert_child_at(parent.child_index, separator, right_offset);
            if parent_node.count() < self.config().split_threshold() {
                return self.store.write(parent.offset, &parent_node);
            }

            offset = parent.offset;
            node = parent_node;
        }
    }

    /// Replace the root with a new internal node over `left` and `right`.
    ///
    /// The only way the tree gains height.
    fn grow_root(&mut self, left: NodeOffset, separator: Pair, right: NodeOffset) -> Result<()> {
        debug_assert_eq!(left, self.root());

        let root = Node::new_root(self.config().capacity(), left, separator, right);
        let root_offset = self.store.append(&root)?;
        self.store.set_root(root_offset)?;
        self.counters.root_splits += 1;

        debug!(old_root = left.0, new_root = root_offset.0, "promoted new root");
        Ok(())
    }

    // ========================================================================
    // Remove
    // ========================================================================

    fn remove_pair(&mut self, pair: &Pair) -> Result<bool> {
        // Copies of an exact duplicate can straddle a split boundary, with
        // some left of the separator equal to them. Start at the leftmost
        // candidate leaf and follow the chain until past `pair`.
        let (mut offset, mut leaf) = self.descend_lower(pair)?;
        let mut steps = 1;
        loop {
            let index = leaf.lower_bound(pair);
            if index < leaf.count() {
                if leaf.pairs()[index] != *pair {
                    return Ok(false);
                }
                leaf.remove_at(index);
                self.store.write(offset, &leaf)?;
                return Ok(true);
            }

            offset = leaf.next();
            if !offset.is_valid() {
                return Ok(false);
            }
            steps += 1;
            self.check_walk(steps, offset)?;
            leaf = self.store.read(offset)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn small_tree() -> (BPlusTree, TempDir) {
        let dir = tempdir().unwrap();
        let config = TreeConfig::with_capacity(4).unwrap().sync_writes(false);
        let tree = BPlusTree::create(dir.path().join("test.idx"), config).unwrap();
        (tree, dir)
    }

    #[test]
    fn test_new_tree_is_single_empty_leaf() {
        let (mut tree, _dir) = small_tree();
        assert_eq!(tree.root(), NodeOffset::new(32));
        assert_eq!(tree.height().unwrap(), 1);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.find("anything").unwrap().is_empty());
    }

    #[test]
    fn test_insert_below_threshold_stays_in_root() {
        let (mut tree, _dir) = small_tree();
        tree.insert("b", 2).unwrap();
        tree.insert("a", 1).unwrap();

        let root = tree.store.read(tree.root()).unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.count(), 2);
        assert_eq!(tree.split_counters(), SplitCounters::default());
    }

    #[test]
    fn test_first_leaf_split_grows_root() {
        let (mut tree, _dir) = small_tree();
        let old_root = tree.root();

        tree.insert("a", 1).unwrap();
        tree.insert("b", 2).unwrap();
        tree.insert("c", 3).unwrap(); // reaches capacity - 1

        assert_ne!(tree.root(), old_root);
        assert_eq!(tree.height().unwrap(), 2);

        let root = tree.store.read(tree.root()).unwrap();
        assert_eq!(root.count(), 1);
        assert_eq!(root.pairs()[0], Pair::new(Key::new("b").unwrap(), 2));
        // Left half keeps the old root's offset
        assert_eq!(root.child(0), old_root);

        let left = tree.store.read(root.child(0)).unwrap();
        let right = tree.store.read(root.child(1)).unwrap();
        assert_eq!(left.count(), 1);
        assert_eq!(right.count(), 2);
        assert_eq!(left.next(), root.child(1));
        assert_eq!(right.next(), NodeOffset::INVALID);

        assert_eq!(
            tree.split_counters(),
            SplitCounters {
                leaf_splits: 1,
                internal_splits: 0,
                root_splits: 1,
            }
        );
    }

    #[test]
    fn test_leaf_split_relinks_chain() {
        let (mut tree, _dir) = small_tree();
        for (i, key) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            tree.insert(key, i as i32).unwrap();
        }

        // Walk the chain by hand: every later leaf starts after the previous one
        let mut offset = tree.leftmost_leaf().unwrap();
        let mut seen = Vec::new();
        while offset.is_valid() {
            let leaf = tree.store.read(offset).unwrap();
            seen.extend(leaf.pairs().iter().map(|p| p.key.to_string()));
            offset = leaf.next();
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_find_collects_across_leaves() {
        let (mut tree, _dir) = small_tree();
        for v in [5, -3, 9, 0, 7, -3] {
            tree.insert("dup", v).unwrap();
        }
        tree.insert("aaa", 1).unwrap();
        tree.insert("zzz", 1).unwrap();

        assert!(tree.height().unwrap() > 1);
        assert_eq!(tree.find("dup").unwrap(), vec![-3, -3, 0, 5, 7, 9]);
    }

    #[test]
    fn test_remove_existing_and_missing() {
        let (mut tree, _dir) = small_tree();
        tree.insert("k", 1).unwrap();
        tree.insert("k", 2).unwrap();

        assert!(tree.remove("k", 1).unwrap());
        assert!(!tree.remove("k", 1).unwrap());
        assert!(!tree.remove("nope", 0).unwrap());
        assert_eq!(tree.find("k").unwrap(), vec![2]);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let (mut tree, _dir) = small_tree();
        let long = "x".repeat(65);
        assert!(matches!(tree.insert(&long, 1), Err(Error::KeyTooLong { .. })));
        assert!(matches!(tree.find("a\0b"), Err(Error::InvalidKey)));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_child_cycle_is_corruption() {
        let (mut tree, _dir) = small_tree();
        for key in ["a", "b", "c"] {
            tree.insert(key, 1).unwrap();
        }
        assert_eq!(tree.height().unwrap(), 2);

        // Point both children of the root back at the root itself
        let root = tree.root();
        let sep = tree.store.read(root).unwrap().pairs()[0];
        tree.store.write(root, &Node::new_root(4, root, sep, root)).unwrap();

        assert!(matches!(tree.height(), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.find("a"), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.insert("d", 1), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.remove("a", 1), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.iter().err(), Some(Error::CorruptNode { .. })));
    }

    #[test]
    fn test_leaf_chain_cycle_is_corruption() {
        let (mut tree, _dir) = small_tree();
        tree.insert("a", 1).unwrap();
        tree.insert("c", 3).unwrap();

        // A lone root leaf whose next pointer loops back to itself
        let root = tree.root();
        let mut leaf = tree.store.read(root).unwrap();
        leaf.set_next(root);
        tree.store.write(root, &leaf).unwrap();

        // Lookups that stop inside the leaf never follow the pointer
        assert_eq!(tree.find("a").unwrap(), vec![1]);

        assert!(tree.find("b").unwrap().is_empty());

        assert!(matches!(tree.find("d"), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.remove("d", 1), Err(Error::CorruptNode { .. })));
    }

    #[test]
    fn test_init_recovers_headerless_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let config = TreeConfig::with_capacity(4).unwrap().sync_writes(false);

        // A header with no nodes, as left by a crash during create
        NodeStore::create(&path, config).unwrap();

        let mut tree = BPlusTree::open_with_sync(&path, false).unwrap();
        assert_eq!(tree.height().unwrap(), 1);
        tree.insert("a", 1).unwrap();
        assert_eq!(tree.find("a").unwrap(), vec![1]);
    }
}
