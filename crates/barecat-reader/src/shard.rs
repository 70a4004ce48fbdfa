//! Shard handles and the owning shard set
//!
//! A [`ShardSet`] is the only owner of shard resources. It is built in one
//! pass over the shard paths; if any shard fails to open, the partially
//! built set is dropped and every shard acquired so far is released by the
//! same routine that releases a fully built set.

use crate::{ArchiveError, Result};
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// One physical backing file of the archive.
pub trait ShardHandle: Sized {
    /// Open the shard at `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened, is not a regular file,
    /// or cannot be mapped
    fn open(path: &Path) -> io::Result<Self>;

    /// Byte length of the shard.
    fn len(&self) -> u64;

    /// True for zero-length shards.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn open_regular_file(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "shard is not a regular file",
        ));
    }
    Ok((file, metadata.len()))
}

/// Shard read through an open file handle.
///
/// Seek and read share one cursor, so the handle is locked for the
/// duration of each read.
#[derive(Debug)]
pub struct FileShard {
    file: Mutex<File>,
    len: u64,
}

impl ShardHandle for FileShard {
    fn open(path: &Path) -> io::Result<Self> {
        let (file, len) = open_regular_file(path)?;
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }

    fn len(&self) -> u64 {
        self.len
    }
}

impl FileShard {
    /// Read exactly `size` bytes at absolute `offset` into a new buffer.
    ///
    /// The range is checked against the shard length before any memory is
    /// reserved.
    pub(crate) fn read_at(&self, shard: u32, offset: u64, size: u64) -> Result<Vec<u8>> {
        self.check_range(shard, offset, size)?;
        let capacity =
            usize::try_from(size).map_err(|_| ArchiveError::Allocation { shard, size })?;
        let mut buf = Vec::new();
        if buf.try_reserve_exact(capacity).is_err() {
            debug!(shard, size, "Failed to allocate read buffer");
            return Err(ArchiveError::Allocation { shard, size });
        }
        buf.resize(capacity, 0);
        self.read_exact_at(shard, offset, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from absolute `offset`.
    pub(crate) fn read_exact_at(&self, shard: u32, offset: u64, buf: &mut [u8]) -> Result<()> {
        let wanted = buf.len() as u64;
        self.check_range(shard, offset, wanted)?;

        let io_error = |source: io::Error| {
            debug!(shard, offset, wanted, "Read failed: {source}");
            ArchiveError::Io {
                shard,
                offset,
                source,
            }
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset)).map_err(io_error)?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(io_error(e)),
            }
        }

        let read = filled as u64;
        if read != wanted {
            debug!(shard, offset, wanted, read, "Short read: EOF");
            return Err(ArchiveError::UnexpectedEof {
                shard,
                offset,
                wanted,
                read,
            });
        }
        Ok(())
    }

    /// A range ending past the shard is a short read of what remains.
    fn check_range(&self, shard: u32, offset: u64, size: u64) -> Result<()> {
        let available = self.len.saturating_sub(offset);
        if size > available {
            debug!(shard, offset, wanted = size, read = available, "Range past shard end");
            return Err(ArchiveError::UnexpectedEof {
                shard,
                offset,
                wanted: size,
                read: available,
            });
        }
        Ok(())
    }
}

/// Shard mapped read-only into memory.
///
/// Zero-length shards hold no mapping.
#[derive(Debug)]
pub struct MappedShard {
    map: Option<Mmap>,
    len: u64,
}

impl ShardHandle for MappedShard {
    fn open(path: &Path) -> io::Result<Self> {
        let (file, len) = open_regular_file(path)?;
        if len == 0 {
            return Ok(Self { map: None, len });
        }

        // SAFETY: shards are immutable for the lifetime of the archive and
        // the mapping is private and read-only.
        #[allow(unsafe_code)]
        let map = unsafe { MmapOptions::new().map_copy_read_only(&file)? };

        let len = map.len() as u64;
        Ok(Self {
            map: Some(map),
            len,
        })
    }

    fn len(&self) -> u64 {
        self.len
    }
}

impl MappedShard {
    /// The whole mapped region.
    pub(crate) fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }
}

/// Owning container for all shards of an archive, indexed `0..len()`.
#[derive(Debug)]
pub struct ShardSet<S: ShardHandle> {
    shards: Vec<S>,
}

impl<S: ShardHandle> ShardSet<S> {
    /// Open every shard in order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::ShardOpen`] for the first shard that fails;
    /// all shards opened before it have been released by then.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut set = Self {
            shards: Vec::with_capacity(paths.len()),
        };

        for (shard, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let handle = S::open(path).map_err(|source| {
                debug!(
                    shard,
                    acquired = set.shards.len(),
                    "Error opening shard {}: {source}",
                    path.display()
                );
                ArchiveError::ShardOpen {
                    shard,
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            set.shards.push(handle);
        }

        debug!("Opened {} shards", set.shards.len());
        Ok(set)
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// True if the set holds no shards.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Shard `shard`, or [`ArchiveError::InvalidArgument`] if out of range.
    pub fn get(&self, shard: u32) -> Result<&S> {
        usize::try_from(shard)
            .ok()
            .and_then(|i| self.shards.get(i))
            .ok_or_else(|| {
                debug!(shard, num_shards = self.shards.len(), "Shard id out of range");
                ArchiveError::InvalidArgument(format!(
                    "shard {shard} out of range (archive has {} shards)",
                    self.shards.len()
                ))
            })
    }

    /// Byte length of shard `shard`, if it exists.
    pub fn shard_len(&self, shard: u32) -> Option<u64> {
        self.get(shard).ok().map(ShardHandle::len)
    }

    /// Sum of all shard lengths.
    pub fn total_len(&self) -> u64 {
        self.shards.iter().map(ShardHandle::len).sum()
    }

    /// Release every held shard, most recently acquired first.
    ///
    /// Calling this again, or dropping the set afterwards, releases nothing.
    pub fn release(&mut self) {
        let count = self.shards.len();
        while let Some(shard) = self.shards.pop() {
            drop(shard);
        }
        if count > 0 {
            debug!("Released {count} shards");
        }
    }
}

impl<S: ShardHandle> Drop for ShardSet<S> {
    fn drop(&mut self) {
        self.release();
    }
}
