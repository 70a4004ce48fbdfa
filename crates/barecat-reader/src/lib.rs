//! Read path for sharded, read-only barecat archives.
//!
//! A barecat archive packs many logical files ("entries") contiguously into
//! a small number of large shard files. A SQLite index maps each entry's
//! path to `(shard, offset, size, crc32c)`.
//!
//! Two backends read entries over the same index and shard set:
//!
//! - [`BufferedArchive`]: seeks the shard file and copies the entry into an
//!   owned `Vec<u8>`
//! - [`MappedArchive`]: maps every shard read-only and hands out borrowed
//!   [`View`]s with no copy
//!
//! Checksums are never checked implicitly. Use `verify` or
//! [`MappedArchive::crc32c_from_address`] when integrity matters.
//!
//! # Storage Layout
//!
//! For an archive at `base`, the index lives at `{base}-sqlite-index` and
//! shard `n` at `{base}-shard-{n:05}`. See [`ArchiveConfig::discover`].
//!
//! # Example
//!
//! ```rust,ignore
//! use barecat_reader::MappedArchive;
//!
//! # fn example() -> barecat_reader::Result<()> {
//! let archive = MappedArchive::init(
//!     "/data/train-sqlite-index",
//!     &["/data/train-shard-00000", "/data/train-shard-00001"],
//! )?;
//! let view = archive.read("/images/0.png")?;
//! println!("{} bytes at shard {} offset {}", view.len(), view.shard(), view.offset());
//! archive.destroy();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod archive;
mod buffered;
pub mod checksum;
mod config;
mod error;
pub mod index;
mod mmap;
mod record;
pub mod shard;

#[cfg(test)]
mod test_support;

pub use archive::Archive;
pub use buffered::BufferedArchive;
pub use checksum::CorruptEntry;
pub use config::{AnyArchive, ArchiveConfig, Backend, index_path, shard_path};
pub use error::{ArchiveError, ErrorKind, Result};
pub use index::{IndexEntry, IndexLookup, MemoryIndex, SqliteIndex};
pub use mmap::{MappedArchive, View};
pub use record::LocationRecord;
pub use shard::{FileShard, MappedShard, ShardHandle, ShardSet};

/// Version information for the reader.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix appended to the archive base path to form the index path.
pub const INDEX_SUFFIX: &str = "-sqlite-index";

/// Suffix appended to the archive base path, followed by the zero-padded
/// shard number, to form a shard path.
pub const SHARD_SUFFIX: &str = "-shard-";
