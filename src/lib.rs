//! bplusdb - a disk-resident B+tree of `(key, value)` pairs in one flat file.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            bplusdb                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              B+Tree Engine (index/btree/)               │   │
//! │  │   insert / remove / find, node splits, root growth      │   │
//! │  │   leaf chain scans, structural verification             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Node Store (storage/)                      │   │
//! │  │   FileHeader (root, capacity) + fixed-size node records │   │
//! │  │   read / write in place / append                        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeOffset, Error, config)
//! - [`storage`] - File layout and node I/O
//! - [`index`] - The B+tree
//!
//! # Quick Start
//! ```no_run
//! use bplusdb::{BPlusTree, TreeConfig};
//!
//! let mut tree = BPlusTree::open_or_create("my_index.idx", TreeConfig::default()).unwrap();
//!
//! tree.insert("apple", 1).unwrap();
//! tree.insert("apple", 3).unwrap();
//! tree.remove("apple", 1).unwrap();
//!
//! assert_eq!(tree.find("apple").unwrap(), vec![3]);
//! ```
//!
//! # Operating assumptions
//! Single-threaded, single-process access. All operations are synchronous
//! and run to completion; nothing is locked.

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_CAPACITY, MAX_CAPACITY, MAX_KEY_LEN};
pub use common::{Error, NodeOffset, Result, TreeConfig};

pub use index::btree::{BPlusTree, Key, LeafChain, Node, Pair, Pairs, SplitCounters, TreeShape};
pub use storage::{FileHeader, NodeStore, StatsSnapshot, StoreStats};
