//! Buffered read engine: seek and copy into an owned buffer

use crate::archive::Archive;
use crate::checksum::{CorruptEntry, crc32c, find_corrupt, verify_entry};
use crate::index::{IndexLookup, SqliteIndex};
use crate::shard::FileShard;
use crate::{LocationRecord, Result};

/// Archive read through open file handles.
pub type BufferedArchive<I = SqliteIndex> = Archive<FileShard, I>;

impl<I: IndexLookup> Archive<FileShard, I> {
    /// Read the whole entry at `path` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the path is absent, `InvalidArgument` if the
    /// record names a shard that does not exist, and an I/O error for seek,
    /// allocation or read failures, including a short read
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let record = self.stat(path)?;
        self.read_record(&record)
    }

    /// Read the bytes described by `record`.
    ///
    /// Zero-length records return an empty buffer without touching the shard.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read)
    pub fn read_record(&self, record: &LocationRecord) -> Result<Vec<u8>> {
        if record.is_empty() {
            return Ok(Vec::new());
        }
        self.shards()
            .get(record.shard)?
            .read_at(record.shard, record.offset, record.size)
    }

    /// Read up to `size` bytes starting `offset` bytes into the entry at `path`.
    ///
    /// The range is clamped to the entry; a start past the end reads nothing.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read)
    pub fn read_range(&self, path: &str, offset: u64, size: u64) -> Result<Vec<u8>> {
        let record = self.stat(path)?.subrange(offset, size)?;
        self.read_record(&record)
    }

    /// Copy bytes of the entry at `path`, starting `offset` bytes in, into
    /// `buf`. Returns the number of bytes copied.
    ///
    /// Copies `min(buf.len(), entry size - offset)` bytes; a start past the
    /// end copies nothing. No checksum is checked.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read)
    pub fn read_into(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let record = self.stat(path)?.subrange(offset, buf.len() as u64)?;
        if record.is_empty() {
            return Ok(0);
        }
        // The clamped size never exceeds buf.len()
        let len = usize::try_from(record.size).unwrap_or(buf.len());
        let dest = &mut buf[..len];
        self.shards()
            .get(record.shard)?
            .read_exact_at(record.shard, record.offset, dest)?;
        Ok(len)
    }

    /// Read the entry at `path` and compare it against its stored CRC32C.
    ///
    /// # Errors
    ///
    /// As [`read`](Self::read); `ChecksumMismatch` if the bytes differ
    pub fn verify(&self, path: &str) -> Result<()> {
        let record = self.stat(path)?;
        let data = self.read_record(&record)?;
        verify_entry(path, &record, &data)
    }

    /// Checksum stored entries and return the ones that do not match.
    ///
    /// A full scan reads every entry in physical order. With `quick` set,
    /// only the last stored entry is read.
    ///
    /// # Errors
    ///
    /// Returns the first index or read error; mismatches are not errors
    pub fn verify_all(&self, quick: bool) -> Result<Vec<CorruptEntry>> {
        let entries = self.entries_to_verify(quick)?;
        find_corrupt(entries, |record| {
            self.read_record(record).map(|data| crc32c(&data))
        })
    }
}
