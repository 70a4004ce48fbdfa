//! Memory-mapped read engine: zero-copy views into mapped shards
//!
//! [`MappedArchive::read_from_address`] is the only place that slices a
//! mapped shard. It checks the shard id and the byte range, with overflow
//! checked arithmetic, before any memory is touched. Every other accessor
//! in this module goes through it.

use crate::archive::Archive;
use crate::checksum::{CorruptEntry, crc32c, find_corrupt, verify_entry};
use crate::index::{IndexLookup, SqliteIndex};
use crate::shard::{MappedShard, ShardHandle};
use crate::{ArchiveError, Result};
use std::ops::Deref;
use tracing::debug;

/// Archive read through read-only memory maps.
pub type MappedArchive<I = SqliteIndex> = Archive<MappedShard, I>;

/// Borrowed, bounds-checked bytes inside a mapped shard.
///
/// A view borrows the archive it came from and cannot outlive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View<'a> {
    shard: u32,
    offset: u64,
    bytes: &'a [u8],
}

impl<'a> View<'a> {
    const fn empty(shard: u32, offset: u64) -> Self {
        Self {
            shard,
            offset,
            bytes: &[],
        }
    }

    /// Shard the view points into.
    pub const fn shard(&self) -> u32 {
        self.shard
    }

    /// Absolute offset of the view within its shard.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// The viewed bytes, borrowed for the archive's lifetime.
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// CRC32C of the viewed bytes.
    pub fn crc32c(&self) -> u32 {
        crc32c(self.bytes)
    }
}

impl Deref for View<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl AsRef<[u8]> for View<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl<I: IndexLookup> Archive<MappedShard, I> {
    /// View the entry at `path` without copying.
    ///
    /// No checksum is checked. Zero-length entries yield an empty view.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the path is absent and `InvalidArgument` if the
    /// record does not fit inside its shard
    pub fn read(&self, path: &str) -> Result<View<'_>> {
        let record = self.stat(path)?;
        if record.is_empty() {
            return Ok(View::empty(record.shard, record.offset));
        }
        self.read_from_address(record.shard, record.offset, record.size)
    }

    /// View `size` bytes at `offset` in shard `shard`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the shard does not exist, if
    /// `offset + size` overflows, or if the range ends past the shard
    pub fn read_from_address(&self, shard: u32, offset: u64, size: u64) -> Result<View<'_>> {
        let handle = self.shards().get(shard)?;
        let shard_len = handle.len();

        let out_of_bounds = || {
            debug!(shard, offset, size, shard_len, "Range outside shard");
            ArchiveError::InvalidArgument(format!(
                "range {offset}+{size} outside shard {shard} of {shard_len} bytes"
            ))
        };

        let end = offset
            .checked_add(size)
            .filter(|&end| end <= shard_len)
            .ok_or_else(out_of_bounds)?;
        let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        let end = usize::try_from(end).map_err(|_| out_of_bounds())?;
        let bytes = handle.bytes().get(start..end).ok_or_else(out_of_bounds)?;

        Ok(View {
            shard,
            offset,
            bytes,
        })
    }

    /// CRC32C of `size` bytes at `offset` in shard `shard`.
    ///
    /// # Errors
    ///
    /// As [`read_from_address`](Self::read_from_address)
    pub fn crc32c_from_address(&self, shard: u32, offset: u64, size: u64) -> Result<u32> {
        Ok(self.read_from_address(shard, offset, size)?.crc32c())
    }

    /// View up to `size` bytes starting `offset` bytes into the entry at `path`.
    ///
    /// The range is clamped to the entry; a start past the end yields an
    /// empty view.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read)
    pub fn read_range(&self, path: &str, offset: u64, size: u64) -> Result<View<'_>> {
        let record = self.stat(path)?.subrange(offset, size)?;
        if record.is_empty() {
            return Ok(View::empty(record.shard, record.offset));
        }
        self.read_from_address(record.shard, record.offset, record.size)
    }

    /// Compare the entry at `path` against its stored CRC32C.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read); `ChecksumMismatch` if the bytes differ
    pub fn verify(&self, path: &str) -> Result<()> {
        let record = self.stat(path)?;
        let view = if record.is_empty() {
            View::empty(record.shard, record.offset)
        } else {
            self.read_from_address(record.shard, record.offset, record.size)?
        };
        verify_entry(path, &record, &view)
    }

    /// Copy bytes of the entry at `path`, starting `offset` bytes in, into
    /// `buf`. Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// As [`read_range`](Self::read_range)
    pub fn read_into(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let view = self.read_range(path, offset, buf.len() as u64)?;
        buf[..view.len()].copy_from_slice(&view);
        Ok(view.len())
    }

    /// Checksum stored entries and return the ones that do not match.
    ///
    /// With `quick` set, only the last stored entry is checked.
    ///
    /// # Errors
    ///
    /// Returns the first index error, or `InvalidArgument` for a record
    /// that does not fit its shard; mismatches are not errors
    pub fn verify_all(&self, quick: bool) -> Result<Vec<CorruptEntry>> {
        let entries = self.entries_to_verify(quick)?;
        find_corrupt(entries, |record| {
            if record.is_empty() {
                return Ok(crc32c(&[]));
            }
            self.crc32c_from_address(record.shard, record.offset, record.size)
        })
    }
}
