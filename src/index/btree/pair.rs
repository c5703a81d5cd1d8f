//! Keys and pairs.
//!
//! A [`Pair`] is ordered by key bytes first and by value second. That
//! composite order lets one key carry many values, each stored as its own
//! entry and routed independently through the tree.

use std::fmt;

use crate::common::config::{KEY_FIELD_SIZE, MAX_KEY_LEN};
use crate::common::{Error, Result};

/// A key of at most [`MAX_KEY_LEN`] bytes, stored null-padded.
///
/// Keys never contain NUL, so comparing the padded buffers byte by byte
/// orders keys exactly like C `strcmp`: a proper prefix sorts first.
///
/// # Example
/// ```
/// use bplusdb::Key;
///
/// let apple = Key::new("apple").unwrap();
/// let apricot = Key::new("apricot").unwrap();
/// assert!(apple < apricot);
/// assert!(Key::new("app").unwrap() < apple);
/// assert!(Key::new(&"x".repeat(65)).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    field: [u8; KEY_FIELD_SIZE],
}

impl Key {
    /// The empty key, also used for unused pair slots.
    pub const EMPTY: Key = Key {
        field: [0u8; KEY_FIELD_SIZE],
    };

    /// Create a key from a string.
    ///
    /// # Errors
    /// - `Error::KeyTooLong` if the key is longer than 64 bytes
    /// - `Error::InvalidKey` if the key contains a NUL byte
    pub fn new(key: &str) -> Result<Self> {
        Self::from_bytes(key.as_bytes())
    }

    /// Create a key from raw bytes.
    ///
    /// # Errors
    /// Same as [`Key::new`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_KEY_LEN {
            return Err(Error::KeyTooLong {
                len: bytes.len(),
                max: MAX_KEY_LEN,
            });
        }
        if bytes.contains(&0) {
            return Err(Error::InvalidKey);
        }

        let mut field = [0u8; KEY_FIELD_SIZE];
        field[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { field })
    }

    /// Decode an on-disk key field.
    ///
    /// Bytes after the first NUL are zeroed so ordering stays consistent.
    /// Returns `None` if the field has no terminator.
    pub(crate) fn from_field(raw: &[u8]) -> Option<Self> {
        let len = raw.iter().take(KEY_FIELD_SIZE).position(|&b| b == 0)?;
        let mut field = [0u8; KEY_FIELD_SIZE];
        field[..len].copy_from_slice(&raw[..len]);
        Some(Self { field })
    }

    /// The padded on-disk field.
    #[inline]
    pub(crate) fn field(&self) -> &[u8; KEY_FIELD_SIZE] {
        &self.field
    }

    /// Key bytes without padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.field[..self.len()]
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.field.iter().position(|&b| b == 0).unwrap_or(MAX_KEY_LEN)
    }

    pub fn is_empty(&self) -> bool {
        self.field[0] == 0
    }
}

impl TryFrom<&str> for Key {
    type Error = Error;

    fn try_from(key: &str) -> Result<Self> {
        Key::new(key)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A stored `(key, value)` entry.
///
/// Field order matters: the derived `Ord` compares `key`, then `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    pub key: Key,
    pub value: i32,
}

impl Pair {
    /// Filler for unused slots.
    pub const EMPTY: Pair = Pair {
        key: Key::EMPTY,
        value: 0,
    };

    pub fn new(key: Key, value: i32) -> Self {
        Self { key, value }
    }

    /// Smallest pair with this key under the composite order.
    ///
    /// Used as the probe when only the key is known.
    pub fn lowest(key: Key) -> Self {
        Self {
            key,
            value: i32::MIN,
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.key, self.value)
    }
}
