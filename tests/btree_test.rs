//! B+tree behaviour tests.
//!
//! End-to-end scenarios through the public API: duplicate keys spread across
//! leaves, cascading internal splits, root growth, and removal of pairs that
//! sit on either side of a split boundary.

use bplusdb::{BPlusTree, Key, Pair, TreeConfig};
use tempfile::{tempdir, TempDir};

fn create_tree(capacity: usize) -> (BPlusTree, TempDir) {
    let dir = tempdir().unwrap();
    let config = TreeConfig::with_capacity(capacity).unwrap().sync_writes(false);
    let tree = BPlusTree::create(dir.path().join("test.idx"), config).unwrap();
    (tree, dir)
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_find_apple_banana() {
    let (mut tree, _dir) = create_tree(4);

    tree.insert("apple", 1).unwrap();
    tree.insert("banana", 2).unwrap();
    tree.insert("apple", 3).unwrap();

    assert_eq!(tree.find("apple").unwrap(), vec![1, 3]);
    assert_eq!(tree.find("banana").unwrap(), vec![2]);
    assert!(tree.find("cherry").unwrap().is_empty());
}

#[test]
fn test_insert_is_immediately_visible() {
    let (mut tree, _dir) = create_tree(4);

    for i in 0..40 {
        let key = format!("k{}", i % 7);
        tree.insert(&key, i).unwrap();
        assert!(tree.find(&key).unwrap().contains(&i));
    }
}

#[test]
fn test_find_does_not_match_prefixes() {
    let (mut tree, _dir) = create_tree(4);

    for key in ["app", "apple", "apples", "ap", "b"] {
        tree.insert(key, key.len() as i32).unwrap();
    }

    assert_eq!(tree.find("apple").unwrap(), vec![5]);
    assert_eq!(tree.find("app").unwrap(), vec![3]);
    assert!(tree.find("a").unwrap().is_empty());
    assert!(tree.find("").unwrap().is_empty());
}

#[test]
fn test_duplicate_pairs_are_kept() {
    let (mut tree, _dir) = create_tree(4);

    for _ in 0..5 {
        tree.insert("same", 7).unwrap();
    }

    assert_eq!(tree.find("same").unwrap(), vec![7; 5]);
    assert_eq!(tree.len().unwrap(), 5);
    tree.verify().unwrap();
}

#[test]
fn test_negative_values_found() {
    let (mut tree, _dir) = create_tree(4);

    for v in [-100, i32::MIN, 0, i32::MAX, -1, 1, -100] {
        tree.insert("n", v).unwrap();
    }
    tree.insert("m", 0).unwrap();
    tree.insert("o", 0).unwrap();

    assert_eq!(
        tree.find("n").unwrap(),
        vec![i32::MIN, -100, -100, -1, 0, 1, i32::MAX]
    );
}

// ============================================================================
// Splitting
// ============================================================================

/// 100 values under one key in capacity-4 nodes.
#[test]
fn test_hundred_values_one_key() {
    let (mut tree, _dir) = create_tree(4);

    for v in 0..100 {
        tree.insert("a", v).unwrap();
    }

    let leaves: Vec<_> = tree.leaves().unwrap().map(|l| l.unwrap().1).collect();
    assert!(leaves.len() > 1);
    for leaf in &leaves {
        assert!(leaf.pairs().windows(2).all(|w| w[0] <= w[1]));
    }

    let chained: Vec<Pair> = leaves.iter().flat_map(|l| l.pairs().to_vec()).collect();
    assert!(chained.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(chained.len(), 100);

    assert_eq!(tree.find("a").unwrap(), (0..100).collect::<Vec<_>>());
    tree.verify().unwrap();
}

#[test]
fn test_cascading_internal_splits() {
    let (mut tree, _dir) = create_tree(4);

    let keys: Vec<String> = (0..200).map(|i| format!("key-{:04}", (i * 37) % 200)).collect();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(key, i as i32).unwrap();
    }

    let counters = tree.split_counters();
    assert!(counters.internal_splits >= 2, "{:?}", counters);

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.find(key).unwrap(), vec![i as i32], "key {}", key);
    }

    // verify() fails on uneven leaf depth
    let shape = tree.verify().unwrap();
    assert_eq!(shape.pair_count, 200);
    assert_eq!(shape.height, tree.height().unwrap());
    assert!(shape.height >= 3);
}

#[test]
fn test_root_split_adds_exactly_one_level() {
    let (mut tree, _dir) = create_tree(4);

    for i in 0..300 {
        let root_before = tree.root();
        let height_before = tree.height().unwrap();
        let root_splits_before = tree.split_counters().root_splits;

        tree.insert(&format!("{:05}", i), i).unwrap();

        let height_after = tree.height().unwrap();
        let root_splits_after = tree.split_counters().root_splits;
        if tree.root() != root_before {
            assert_eq!(height_after, height_before + 1);
            assert_eq!(root_splits_after, root_splits_before + 1);
        } else {
            assert_eq!(height_after, height_before);
            assert_eq!(root_splits_after, root_splits_before);
        }
    }

    assert_eq!(
        tree.split_counters().root_splits as usize,
        tree.height().unwrap() - 1
    );
}

#[test]
fn test_default_capacity_large_load() {
    let (mut tree, _dir) = create_tree(bplusdb::DEFAULT_CAPACITY);

    for i in 0..3000 {
        tree.insert(&format!("user:{}", i % 1000), i).unwrap();
    }

    assert_eq!(tree.find("user:7").unwrap(), vec![7, 1007, 2007]);
    let shape = tree.verify().unwrap();
    assert_eq!(shape.pair_count, 3000);
    assert!(shape.height >= 2);
}

#[test]
fn test_split_appends_and_never_moves_nodes() {
    let (mut tree, _dir) = create_tree(4);

    tree.insert("a", 1).unwrap();
    tree.insert("b", 1).unwrap();
    let first_leaf = tree.leaves().unwrap().next().unwrap().unwrap().0;

    for i in 0..50 {
        tree.insert(&format!("c{}", i), i).unwrap();
    }

    // Original root leaf is still the leftmost leaf at the same address
    let (offset, leaf) = tree.leaves().unwrap().next().unwrap().unwrap();
    assert_eq!(offset, first_leaf);
    assert_eq!(leaf.pairs()[0], Pair::new(Key::new("a").unwrap(), 1));

    // Every node, including the initial root leaf, was appended exactly once
    let stats = tree.store_stats();
    assert_eq!(stats.nodes_appended, tree.node_count());
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_remove_nonexistent_is_noop() {
    let (mut tree, _dir) = create_tree(4);
    tree.insert("k", 1).unwrap();

    assert!(!tree.remove("k", 2).unwrap());
    assert!(!tree.remove("other", 1).unwrap());
    assert_eq!(tree.find("k").unwrap(), vec![1]);
}

/// ("k", 1) and ("k", 2) end up in different leaves; removing the left one
/// works because removal starts at the leftmost candidate leaf.
#[test]
fn test_remove_across_split_boundary() {
    let (mut tree, _dir) = create_tree(4);

    tree.insert("k", 1).unwrap();
    tree.insert("k", 2).unwrap();
    tree.insert("k", 3).unwrap(); // leaf splits: [k1] | [k2, k3]

    let leaves: Vec<_> = tree.leaves().unwrap().map(|l| l.unwrap().1).collect();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].pairs()[0].value, 1);
    assert_eq!(leaves[1].pairs()[0].value, 2);

    assert!(tree.remove("k", 1).unwrap());
    assert_eq!(tree.find("k").unwrap(), vec![2, 3]);
    assert!(tree.remove("k", 3).unwrap());
    assert_eq!(tree.find("k").unwrap(), vec![2]);
}

/// Exact duplicates straddling a split: the separator equals copies on both
/// sides. Every copy `find` reports can be removed.
#[test]
fn test_remove_duplicates_straddling_split() {
    let (mut tree, _dir) = create_tree(4);

    for _ in 0..3 {
        tree.insert("d", 5).unwrap(); // third insert splits: [d5] | [d5, d5]
    }
    assert_eq!(tree.leaves().unwrap().count(), 2);

    for remaining in (0..3).rev() {
        assert!(tree.remove("d", 5).unwrap());
        assert_eq!(tree.find("d").unwrap().len(), remaining);
    }
    assert!(!tree.remove("d", 5).unwrap());
}

#[test]
fn test_remove_never_rebalances() {
    let (mut tree, _dir) = create_tree(4);

    for i in 0..60 {
        tree.insert(&format!("{:03}", i), i).unwrap();
    }
    let nodes = tree.node_count();
    let height = tree.height().unwrap();

    for i in 0..60 {
        assert!(tree.remove(&format!("{:03}", i), i).unwrap());
    }

    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.node_count(), nodes);
    assert_eq!(tree.height().unwrap(), height);
    tree.verify().unwrap();

    // Emptied tree still accepts inserts everywhere
    tree.insert("030", 1).unwrap();
    tree.insert("999", 2).unwrap();
    assert_eq!(tree.find("030").unwrap(), vec![1]);
    assert_eq!(tree.find("999").unwrap(), vec![2]);
    tree.verify().unwrap();
}

// ============================================================================
// Scans
// ============================================================================

#[test]
fn test_range_scan_across_leaves() {
    let (mut tree, _dir) = create_tree(4);

    for i in 0..100 {
        tree.insert(&format!("{:03}", i), i).unwrap();
    }

    let values: Vec<i32> = tree
        .range("020", "035")
        .unwrap()
        .map(|p| p.unwrap().value)
        .collect();
    assert_eq!(values, (20..35).collect::<Vec<_>>());
}
