//! Archive configuration and on-disk layout discovery

use crate::buffered::BufferedArchive;
use crate::checksum::CorruptEntry;
use crate::mmap::MappedArchive;
use crate::{ArchiveError, INDEX_SUFFIX, LocationRecord, Result, SHARD_SUFFIX};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read backend used to access shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Seek and copy through open file handles
    Buffered,
    /// Zero-copy views into read-only memory maps
    #[default]
    Mmap,
}

/// Configuration for opening an archive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Path of the SQLite index
    pub index_path: PathBuf,

    /// Shard paths, in shard id order
    #[serde(default)]
    pub shard_paths: Vec<PathBuf>,

    /// Read backend
    #[serde(default)]
    pub backend: Backend,
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of shard `shard` for the archive at `base`: `{base}-shard-{shard:05}`.
pub fn shard_path(base: impl AsRef<Path>, shard: usize) -> PathBuf {
    with_suffix(base.as_ref(), &format!("{SHARD_SUFFIX}{shard:05}"))
}

/// Path of the index for the archive at `base`: `{base}-sqlite-index`.
pub fn index_path(base: impl AsRef<Path>) -> PathBuf {
    with_suffix(base.as_ref(), INDEX_SUFFIX)
}

impl ArchiveConfig {
    /// Create a configuration for the given index with no shards
    pub fn new<P: AsRef<Path>>(index_path: P) -> Self {
        Self {
            index_path: index_path.as_ref().to_path_buf(),
            shard_paths: Vec::new(),
            backend: Backend::default(),
        }
    }

    /// Discover the standard layout of the archive at `base`.
    ///
    /// Shards are numbered contiguously from zero; discovery stops at the
    /// first missing number.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the index file does not exist
    pub fn discover<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref();
        let index = index_path(base);
        if !index.is_file() {
            return Err(ArchiveError::Config(format!(
                "No index found at {}",
                index.display()
            )));
        }

        let shard_paths: Vec<PathBuf> = (0..)
            .map(|i| shard_path(base, i))
            .take_while(|p| p.is_file())
            .collect();

        debug!(
            "Discovered archive {} with {} shards",
            base.display(),
            shard_paths.len()
        );
        Ok(Self {
            index_path: index,
            shard_paths,
            backend: Backend::default(),
        })
    }

    /// Append a shard path
    #[must_use]
    pub fn with_shard<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.shard_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Replace the shard paths
    #[must_use]
    pub fn with_shards<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.shard_paths = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Select the read backend
    #[must_use]
    pub const fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Open the archive with the configured backend
    ///
    /// # Errors
    ///
    /// As [`Archive::init`](crate::Archive::init)
    pub fn open(&self) -> Result<AnyArchive> {
        Ok(match self.backend {
            Backend::Buffered => {
                AnyArchive::Buffered(BufferedArchive::init(&self.index_path, &self.shard_paths)?)
            }
            Backend::Mmap => {
                AnyArchive::Mapped(MappedArchive::init(&self.index_path, &self.shard_paths)?)
            }
        })
    }
}

/// An archive opened with a backend chosen at runtime
#[derive(Debug)]
pub enum AnyArchive {
    /// Buffered backend
    Buffered(BufferedArchive),
    /// Memory-mapped backend
    Mapped(MappedArchive),
}

impl AnyArchive {
    /// Backend in use
    pub const fn backend(&self) -> Backend {
        match self {
            Self::Buffered(_) => Backend::Buffered,
            Self::Mapped(_) => Backend::Mmap,
        }
    }

    /// Location of `path`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the path is absent
    pub fn stat(&self, path: &str) -> Result<LocationRecord> {
        match self {
            Self::Buffered(a) => a.stat(path),
            Self::Mapped(a) => a.stat(path),
        }
    }

    /// True if `path` is in the index
    ///
    /// # Errors
    ///
    /// Returns error if the index lookup fails
    pub fn contains(&self, path: &str) -> Result<bool> {
        match self {
            Self::Buffered(a) => a.contains(path),
            Self::Mapped(a) => a.contains(path),
        }
    }

    /// Read the entry at `path` into an owned buffer
    ///
    /// # Errors
    ///
    /// As the backend's `read`
    pub fn read_owned(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            Self::Buffered(a) => a.read(path),
            Self::Mapped(a) => a.read(path).map(|view| view.to_vec()),
        }
    }

    /// Compare the entry at `path` against its stored CRC32C
    ///
    /// # Errors
    ///
    /// As the backend's `verify`
    pub fn verify(&self, path: &str) -> Result<()> {
        match self {
            Self::Buffered(a) => a.verify(path),
            Self::Mapped(a) => a.verify(path),
        }
    }

    /// Copy bytes of the entry at `path`, starting `offset` bytes in, into `buf`
    ///
    /// # Errors
    ///
    /// As the backend's `read_into`
    pub fn read_into(&self, path: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        match self {
            Self::Buffered(a) => a.read_into(path, buf, offset),
            Self::Mapped(a) => a.read_into(path, buf, offset),
        }
    }

    /// Checksum stored entries and return the ones that do not match
    ///
    /// # Errors
    ///
    /// As the backend's `verify_all`
    pub fn verify_all(&self, quick: bool) -> Result<Vec<CorruptEntry>> {
        match self {
            Self::Buffered(a) => a.verify_all(quick),
            Self::Mapped(a) => a.verify_all(quick),
        }
    }

    /// Number of shards
    pub fn num_shards(&self) -> usize {
        match self {
            Self::Buffered(a) => a.num_shards(),
            Self::Mapped(a) => a.num_shards(),
        }
    }

    /// Release all resources
    pub fn destroy(self) {
        match self {
            Self::Buffered(a) => a.destroy(),
            Self::Mapped(a) => a.destroy(),
        }
    }
}
