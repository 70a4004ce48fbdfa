//! Error types for archive read operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur while opening or reading an archive.
///
/// Every variant maps onto a coarse [`ErrorKind`]; the variants themselves
/// carry the diagnostic detail (shard, offset, byte counts) needed to debug
/// a failing archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The SQLite index could not be opened or queried.
    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// The index returned a row that cannot describe a valid location.
    #[error("Corrupt index record for {path}: {reason}")]
    CorruptRecord {
        /// Logical path of the offending row
        path: String,
        /// What was wrong with it
        reason: String,
    },

    /// A shard file could not be opened or mapped during `init`.
    #[error("Failed to open shard {shard} at {}: {source}", .path.display())]
    ShardOpen {
        /// Position of the shard in the shard list
        shard: usize,
        /// Filesystem path of the shard
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The path is absent from the index.
    #[error("Path not found in index: {0}")]
    NotFound(String),

    /// Shard id or byte range out of bounds.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Seek or read failure on an open shard.
    #[error("I/O error on shard {shard} at offset {offset}: {source}")]
    Io {
        /// Shard being read
        shard: u32,
        /// Absolute offset of the read
        offset: u64,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The shard ended before the requested number of bytes was read.
    #[error(
        "Unexpected end of shard {shard}: wanted {wanted} bytes at offset {offset}, read {read}"
    )]
    UnexpectedEof {
        /// Shard being read
        shard: u32,
        /// Absolute offset of the read
        offset: u64,
        /// Bytes requested
        wanted: u64,
        /// Bytes actually read before end of file
        read: u64,
    },

    /// The read buffer could not be allocated.
    #[error("Failed to allocate {size} bytes for read from shard {shard}")]
    Allocation {
        /// Shard being read
        shard: u32,
        /// Requested buffer size
        size: u64,
    },

    /// Explicit verification found bytes that do not match the stored checksum.
    #[error("CRC32C mismatch for {path}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Logical path of the entry
        path: String,
        /// Checksum stored in the index
        expected: u32,
        /// Checksum of the bytes on disk
        actual: u32,
    },

    /// Archive layout or configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`ArchiveError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Path absent from the index
    NotFound,
    /// Shard id or byte range out of bounds
    InvalidArgument,
    /// Open, seek, read, map or allocation failure
    Io,
    /// Index unreachable or corrupt
    Index,
    /// Checksum mismatch found by explicit verification
    Integrity,
    /// Layout or configuration problem
    Config,
}

impl ArchiveError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Index(_) | Self::CorruptRecord { .. } => ErrorKind::Index,
            Self::ShardOpen { .. }
            | Self::Io { .. }
            | Self::UnexpectedEof { .. }
            | Self::Allocation { .. } => ErrorKind::Io,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// True if the path was absent from the index.
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    /// True if a shard id or byte range was rejected.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidArgument)
    }

    /// True for open, seek, read, map and allocation failures.
    pub const fn is_io(&self) -> bool {
        matches!(self.kind(), ErrorKind::Io)
    }
}
