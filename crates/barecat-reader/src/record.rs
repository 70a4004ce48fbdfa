//! Location records returned by the index

use crate::{ArchiveError, Result};

/// Physical location of an entry inside the archive.
///
/// Records come from the index and are treated as untrusted: anything that
/// touches mapped memory re-checks `offset + size` against the shard length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationRecord {
    /// Shard holding the entry
    pub shard: u32,
    /// Byte offset of the entry within the shard
    pub offset: u64,
    /// Byte length of the entry
    pub size: u64,
    /// CRC32C of the entry bytes, if the index stores one
    pub checksum: Option<u32>,
}

impl LocationRecord {
    /// Create a record with a stored checksum.
    pub const fn new(shard: u32, offset: u64, size: u64, checksum: u32) -> Self {
        Self {
            shard,
            offset,
            size,
            checksum: Some(checksum),
        }
    }

    /// Create a record with no stored checksum.
    pub const fn without_checksum(shard: u32, offset: u64, size: u64) -> Self {
        Self {
            shard,
            offset,
            size,
            checksum: None,
        }
    }

    /// True for zero-byte entries.
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// End offset of the entry, or `None` if `offset + size` overflows.
    pub const fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// Narrow the record to `size` bytes starting `offset` bytes into the entry.
    ///
    /// Both ends are clamped to the entry, so a start at or past the end
    /// yields an empty record. The narrowed record has no checksum since
    /// the stored one covers the whole entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the absolute start offset overflows
    pub fn subrange(&self, offset: u64, size: u64) -> Result<Self> {
        let offset = offset.min(self.size);
        let start = self.offset.checked_add(offset).ok_or_else(|| {
            ArchiveError::InvalidArgument(format!(
                "range start overflows: {} + {offset}",
                self.offset
            ))
        })?;
        Ok(Self::without_checksum(
            self.shard,
            start,
            size.min(self.size - offset),
        ))
    }
}
