//! Error types for bplusdb.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in bplusdb.
///
/// Every failure is fatal to the operation that hit it. Nothing is retried
/// and partially applied multi-node updates are not rolled back.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Offset does not address a node record in this file.
    #[error("Invalid node offset: {0}")]
    InvalidOffset(i64),

    /// Key exceeds the fixed key field.
    #[error("Key is {len} bytes, maximum is {max}")]
    KeyTooLong { len: usize, max: usize },

    /// Key contains a NUL byte, which the null-padded key field can't hold.
    #[error("Key contains a NUL byte")]
    InvalidKey,

    /// Node capacity is too small or too large.
    #[error("Invalid node capacity: {0}")]
    InvalidCapacity(usize),

    /// File was written with a different node capacity.
    #[error("File capacity {file} does not match configured capacity {config}")]
    CapacityMismatch { file: usize, config: usize },

    /// File does not start with the bplusdb magic number.
    #[error("Not a bplusdb file (bad magic)")]
    BadMagic,

    /// File format version is not understood.
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Header checksum does not match its contents.
    #[error("Header checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    HeaderChecksumMismatch { stored: u32, computed: u32 },

    /// File length is not a header plus a whole number of node records.
    #[error("File length {len} is not a whole number of {record_size}-byte node records")]
    TruncatedFile { len: u64, record_size: usize },

    /// A node record decoded to an impossible state.
    #[error("Corrupt node at offset {offset}: {reason}")]
    CorruptNode { offset: i64, reason: String },

    /// A structural tree invariant does not hold.
    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),
}
