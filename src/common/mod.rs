//! Common types and utilities shared across bplusdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TreeConfig`]
//! - Error types
//! - [`NodeOffset`], the file-offset node identifier

pub mod config;
pub mod error;
mod node_offset;

pub use config::TreeConfig;
pub use error::{Error, Result};
pub use node_offset::NodeOffset;
