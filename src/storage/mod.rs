//! Storage layer - the node file.
//!
//! This module handles persistent storage:
//! - [`NodeStore`] - Fixed-size node records addressed by byte offset
//! - [`FileHeader`] - Magic, capacity and root offset at the start of the file
//! - [`StoreStats`] - I/O counters

mod file_header;
mod node_store;
mod stats;

pub use file_header::{FileHeader, FORMAT_VERSION, MAGIC};
pub use node_store::NodeStore;
pub use stats::{StatsSnapshot, StoreStats};
