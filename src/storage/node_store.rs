//! Node Store - fixed-size node records in a single file.
//!
//! The [`NodeStore`] handles all direct file operations:
//! - Reading and rewriting node records in place
//! - Appending new nodes at end of file
//! - Persisting the root offset in the file header

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{info, trace, warn};

use crate::common::{Error, NodeOffset, Result, TreeConfig};
use crate::index::btree::Node;
use crate::storage::{FileHeader, StoreStats};

/// Manages node records for one index file.
///
/// # File Layout
/// ```text
/// ┌────────┬──────────┬──────────┬─────┬──────────┐
/// │ Header │ Node     │ Node     │ ... │ Node     │
/// │ (32B)  │ (record) │ (record) │     │ (record) │
/// └────────┴──────────┴──────────┴─────┴──────────┘
/// Offset: 0   32     32 + R      ...   32 + N×R
/// ```
///
/// A node's address is its byte offset. Existing nodes are rewritten in
/// place; new nodes are always appended, so the file only grows and an
/// address stays valid for the life of the file.
///
/// # Thread Safety
/// `NodeStore` is **single-threaded**. Callers must serialize all access;
/// there is no locking and no protection against other processes opening
/// the same file.
///
/// # Durability
/// With `sync_writes` enabled every write is followed by `sync_data()`, so
/// it is durable on return. No operation spans several records atomically.
pub struct NodeStore {
    file: File,
    config: TreeConfig,
    header: FileHeader,
    /// Number of node records in the file.
    node_count: u64,
    stats: StoreStats,
    /// Scratch buffer of exactly one record.
    record: Vec<u8>,
}

impl NodeStore {
    /// Create a new index file containing only a header.
    ///
    /// The root offset starts out `INVALID`; the tree appends its first root
    /// and records it with [`NodeStore::set_root`].
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let header = FileHeader::new(config.capacity() as u32);
        file.write_all(&header.to_bytes())?;
        if config.sync_writes {
            file.sync_all()?;
        }

        info!(
            path = %path.as_ref().display(),
            capacity = config.capacity(),
            record_size = config.record_size(),
            "created node store"
        );

        Ok(Self::from_parts(file, config, header, 0))
    }

    /// Open an existing index file.
    ///
    /// The node capacity comes from the header.
    ///
    /// # Errors
    /// - I/O errors if the file doesn't exist or cannot be read
    /// - `Error::TruncatedFile` if the length isn't a header plus whole records
    /// - Header validation errors (`BadMagic`, `HeaderChecksumMismatch`, ...)
    /// - `Error::InvalidCapacity` if the header declares an unusable capacity
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        let file_size = file.metadata()?.len();

        if file_size < FileHeader::SIZE as u64 {
            warn!(path = %path.as_ref().display(), file_size, "file shorter than header");
            return Err(Error::TruncatedFile {
                len: file_size,
                record_size: 0,
            });
        }

        let mut raw = [0u8; FileHeader::SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut raw)?;
        let header = FileHeader::from_bytes(&raw).inspect_err(|e| {
            warn!(path = %path.as_ref().display(), error = %e, "rejected file header");
        })?;

        // Checked before any record-sized buffer is allocated
        let config = TreeConfig::with_capacity(header.capacity as usize)
            .inspect_err(|e| {
                warn!(path = %path.as_ref().display(), error = %e, "rejected header capacity");
            })?
            .sync_writes(sync_writes);
        let record_size = config.record_size() as u64;
        let body = file_size - FileHeader::SIZE as u64;
        if body % record_size != 0 {
            warn!(
                path = %path.as_ref().display(),
                file_size,
                record_size,
                "file is not a whole number of node records"
            );
            return Err(Error::TruncatedFile {
                len: file_size,
                record_size: config.record_size(),
            });
        }

        let store = Self::from_parts(file, config, header, body / record_size);
        if header.root.is_valid() && !store.is_node_offset(header.root) {
            return Err(Error::InvalidOffset(header.root.0));
        }

        info!(
            path = %path.as_ref().display(),
            capacity = config.capacity(),
            nodes = store.node_count,
            root = header.root.0,
            "opened node store"
        );

        Ok(store)
    }

    /// Open an existing index file, or create it if it doesn't exist.
    ///
    /// # Errors
    /// Returns `Error::CapacityMismatch` if an existing file was written with
    /// a different capacity than `config`.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        if path.as_ref().exists() {
            let store = Self::open(path, config.sync_writes)?;
            if store.config.capacity() != config.capacity() {
                return Err(Error::CapacityMismatch {
                    file: store.config.capacity(),
                    config: config.capacity(),
                });
            }
            Ok(store)
        } else {
            Self::create(path, config)
        }
    }

    fn from_parts(file: File, config: TreeConfig, header: FileHeader, node_count: u64) -> Self {
        Self {
            file,
            config,
            header,
            node_count,
            stats: StoreStats::new(),
            record: vec![0u8; config.record_size()],
        }
    }

    // ========================================================================
    // Node I/O
    // ========================================================================

    /// Read the node at `offset`.
    ///
    /// # Errors
    /// - `Error::InvalidOffset` if `offset` doesn't address a record
    /// - `Error::CorruptNode` if the record doesn't decode
    pub fn read(&mut self, offset: NodeOffset) -> Result<Node> {
        self.check_offset(offset)?;

        self.file.seek(SeekFrom::Start(offset.0 as u64))?;
        self.file.read_exact(&mut self.record)?;
        self.stats.record_read();
        trace!(offset = offset.0, "read node");

        Node::decode(&self.record, self.config.capacity())
            .map_err(|reason| Error::CorruptNode {
                offset: offset.0,
                reason,
            })
    }

    /// Overwrite the node at `offset`.
    ///
    /// # Errors
    /// Returns `Error::InvalidOffset` if `offset` doesn't address an existing
    /// record. New nodes go through [`NodeStore::append`].
    pub fn write(&mut self, offset: NodeOffset, node: &Node) -> Result<()> {
        self.check_offset(offset)?;

        self.write_record(offset, node)?;
        self.stats.record_write();
        trace!(offset = offset.0, leaf = node.is_leaf(), count = node.count(), "wrote node");
        Ok(())
    }

    /// Write `node` at end of file and return its permanent offset.
    pub fn append(&mut self, node: &Node) -> Result<NodeOffset> {
        let offset = self.offset_of(self.node_count);

        self.write_record(offset, node)?;
        self.node_count += 1;
        self.stats.record_append();
        trace!(offset = offset.0, leaf = node.is_leaf(), count = node.count(), "appended node");
        Ok(offset)
    }

    fn write_record(&mut self, offset: NodeOffset, node: &Node) -> Result<()> {
        node.encode(&mut self.record);

        self.file.seek(SeekFrom::Start(offset.0 as u64))?;
        self.file.write_all(&self.record)?;
        if self.config.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    // ========================================================================
    // Root pointer
    // ========================================================================

    /// Offset of the current root, `INVALID` in a file with no nodes yet.
    #[inline]
    pub fn root(&self) -> NodeOffset {
        self.header.root
    }

    /// Record a new root offset in the file header.
    ///
    /// # Errors
    /// Returns `Error::InvalidOffset` if `root` doesn't address a record.
    pub fn set_root(&mut self, root: NodeOffset) -> Result<()> {
        self.check_offset(root)?;

        self.header.root = root;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        if self.config.sync_writes {
            self.file.sync_data()?;
        }
        self.stats.record_header_write();
        Ok(())
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// True if `offset` is the start of an existing record.
    pub fn is_node_offset(&self, offset: NodeOffset) -> bool {
        let first = FileHeader::SIZE as i64;
        let record_size = self.config.record_size() as i64;
        offset.0 >= first
            && (offset.0 - first) % record_size == 0
            && ((offset.0 - first) / record_size) < self.node_count as i64
    }

    fn check_offset(&self, offset: NodeOffset) -> Result<()> {
        if self.is_node_offset(offset) {
            Ok(())
        } else {
            Err(Error::InvalidOffset(offset.0))
        }
    }

    fn offset_of(&self, index: u64) -> NodeOffset {
        let record_size = self.config.record_size() as u64;
        NodeOffset::new((FileHeader::SIZE as u64 + index * record_size) as i64)
    }

    /// Configuration this file was opened or created with.
    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of node records in the file.
    #[inline]
    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        FileHeader::SIZE as u64 + self.node_count * self.config.record_size() as u64
    }

    /// I/O counters.
    #[inline]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}
