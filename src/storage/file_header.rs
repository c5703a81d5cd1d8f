//! File header.
//!
//! The first [`FileHeader::SIZE`] bytes of every index file hold the metadata
//! needed to reopen it: the node capacity (which fixes the record size) and
//! the offset of the current root node.

use crate::common::config::FILE_HEADER_SIZE;
use crate::common::{Error, NodeOffset, Result};

/// Magic number identifying a bplusdb file.
pub const MAGIC: [u8; 8] = *b"BPLUSKV1";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Metadata stored at the beginning of the file.
///
/// # Layout (32 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     magic ("BPLUSKV1")
/// 8       4     format version (u32, little-endian)
/// 12      4     node capacity (u32, little-endian)
/// 16      8     root offset (i64, little-endian)
/// 24      4     checksum (CRC32 of bytes 0..24, little-endian)
/// 28      4     reserved (zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version this file was written with.
    pub version: u32,
    /// Pair slots per node.
    pub capacity: u32,
    /// Offset of the root node, `INVALID` until the first root is appended.
    pub root: NodeOffset,
}

impl FileHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = FILE_HEADER_SIZE;

    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_VERSION: usize = 8;
    pub const OFFSET_CAPACITY: usize = 12;
    pub const OFFSET_ROOT: usize = 16;
    pub const OFFSET_CHECKSUM: usize = 24;

    /// Create a header for a fresh file with no root yet.
    pub fn new(capacity: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            capacity,
            root: NodeOffset::INVALID,
        }
    }

    /// Serialize the header, computing its checksum.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut data = [0u8; Self::SIZE];

        data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 8].copy_from_slice(&MAGIC);
        data[Self::OFFSET_VERSION..Self::OFFSET_VERSION + 4]
            .copy_from_slice(&self.version.to_le_bytes());
        data[Self::OFFSET_CAPACITY..Self::OFFSET_CAPACITY + 4]
            .copy_from_slice(&self.capacity.to_le_bytes());
        data[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 8].copy_from_slice(&self.root.0.to_le_bytes());

        let checksum = Self::compute_checksum(&data);
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());

        data
    }

    /// Parse and validate a header.
    ///
    /// # Errors
    /// - `Error::BadMagic` if the magic number is wrong
    /// - `Error::HeaderChecksumMismatch` if the stored CRC doesn't match
    /// - `Error::UnsupportedVersion` for an unknown format version
    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Result<Self> {
        if data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 8] != MAGIC {
            return Err(Error::BadMagic);
        }

        let stored = read_u32(data, Self::OFFSET_CHECKSUM);
        let computed = Self::compute_checksum(data);
        if stored != computed {
            return Err(Error::HeaderChecksumMismatch { stored, computed });
        }

        let version = read_u32(data, Self::OFFSET_VERSION);
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut root = [0u8; 8];
        root.copy_from_slice(&data[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 8]);

        Ok(Self {
            version,
            capacity: read_u32(data, Self::OFFSET_CAPACITY),
            root: NodeOffset::new(i64::from_le_bytes(root)),
        })
    }

    /// CRC32 over every field before the checksum.
    pub fn compute_checksum(data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[..Self::OFFSET_CHECKSUM]);
        hasher.finalize()
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new() {
        let header = FileHeader::new(52);
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.capacity, 52);
        assert_eq!(header.root, NodeOffset::INVALID);
    }

    #[test]
    fn test_header_roundtrip() {
        let original = FileHeader {
            version: FORMAT_VERSION,
            capacity: 4,
            root: NodeOffset::new(0x0123_4567_89AB),
        };

        let recovered = FileHeader::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_header_byte_layout() {
        let header = FileHeader {
            version: FORMAT_VERSION,
            capacity: 0x04030201,
            root: NodeOffset::new(0x0807060504030201),
        };

        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..8], b"BPLUSKV1");
        assert_eq!(bytes[8], 1); // version LSB
        assert_eq!(bytes[12], 0x01); // capacity LSB
        assert_eq!(bytes[15], 0x04); // capacity MSB
        assert_eq!(bytes[16], 0x01); // root LSB
        assert_eq!(bytes[23], 0x08); // root MSB
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);

        let checksum = u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        assert_eq!(checksum, FileHeader::compute_checksum(&bytes));
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = FileHeader::new(4).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(FileHeader::from_bytes(&bytes), Err(Error::BadMagic)));
    }

    #[test]
    fn test_header_detects_corruption() {
        let mut bytes = FileHeader::new(4).to_bytes();
        bytes[FileHeader::OFFSET_ROOT] ^= 0xFF;
        assert!(matches!(
            FileHeader::from_bytes(&bytes),
            Err(Error::HeaderChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_header_unsupported_version() {
        let header = FileHeader {
            version: 99,
            capacity: 4,
            root: NodeOffset::INVALID,
        };
        assert!(matches!(
            FileHeader::from_bytes(&header.to_bytes()),
            Err(Error::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_checksum_ignores_reserved_bytes() {
        let mut bytes = FileHeader::new(4).to_bytes();
        let before = FileHeader::compute_checksum(&bytes);
        bytes[30] = 0xFF;
        assert_eq!(before, FileHeader::compute_checksum(&bytes));
    }
}
