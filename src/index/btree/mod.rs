//! Disk-resident B+tree index.
//!
//! - [`Key`] / [`Pair`] - Entries and their composite `(key, value)` order
//! - [`Node`] - Fixed-capacity leaf/internal record and its codec
//! - [`BPlusTree`] - Insert, remove, find, with splitting and root growth
//! - [`LeafChain`] / [`Pairs`] - Ordered scans along the leaf sibling links
//! - [`TreeShape`] - Result of [`BPlusTree::verify`]

mod leaf_chain;
mod node;
mod pair;
mod tree;
mod verify;

pub use leaf_chain::{LeafChain, Pairs};
pub use node::Node;
pub use pair::{Key, Pair};
pub use tree::{BPlusTree, SplitCounters};
pub use verify::TreeShape;
