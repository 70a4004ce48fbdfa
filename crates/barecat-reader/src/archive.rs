//! Archive lifecycle: all-or-nothing `init`, best-effort `destroy`
//!
//! An [`Archive`] owns the index and every shard. The backend is chosen by
//! the shard handle type: [`FileShard`](crate::FileShard) for buffered reads,
//! [`MappedShard`](crate::MappedShard) for zero-copy views.

use crate::index::{IndexEntry, IndexLookup, SqliteIndex};
use crate::shard::{ShardHandle, ShardSet};
use crate::{ArchiveError, LocationRecord, Result};
use std::path::Path;
use tracing::{debug, warn};

/// An open archive: the index plus all shards.
///
/// Fields are declared so that the index is released before the shards.
#[derive(Debug)]
pub struct Archive<S: ShardHandle, I: IndexLookup = SqliteIndex> {
    index: I,
    shards: ShardSet<S>,
}

impl<S: ShardHandle> Archive<S, SqliteIndex> {
    /// Open the SQLite index at `index_path` and every shard in `shard_paths`.
    ///
    /// Nothing is left open on failure.
    ///
    /// # Errors
    ///
    /// Returns an index error if the index cannot be opened or prepared, or
    /// [`ArchiveError::ShardOpen`] for the first shard that cannot be opened
    pub fn init<P: AsRef<Path>>(index_path: impl AsRef<Path>, shard_paths: &[P]) -> Result<Self> {
        let index = SqliteIndex::open(index_path)?;
        Self::with_index(index, shard_paths)
    }
}

impl<S: ShardHandle, I: IndexLookup> Archive<S, I> {
    /// Open every shard in `shard_paths` behind an already open index.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::ShardOpen`] for the first shard that cannot be
    /// opened; the index and earlier shards are released before returning
    pub fn with_index<P: AsRef<Path>>(index: I, shard_paths: &[P]) -> Result<Self> {
        let shards = ShardSet::open(shard_paths)?;
        Ok(Self { index, shards })
    }

    /// Location of `path`, or [`ArchiveError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns error if the path is absent or the index lookup fails
    pub fn stat(&self, path: &str) -> Result<LocationRecord> {
        self.index.lookup(path)?.ok_or_else(|| {
            debug!(path, "Path not found in index");
            ArchiveError::NotFound(path.to_string())
        })
    }

    /// True if `path` is in the index.
    ///
    /// # Errors
    ///
    /// Returns error if the index lookup fails
    pub fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.index.lookup(path)?.is_some())
    }

    /// Number of shards.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Byte length of shard `shard`, if it exists.
    pub fn shard_len(&self, shard: u32) -> Option<u64> {
        self.shards.shard_len(shard)
    }

    /// Sum of all shard lengths.
    pub fn total_physical_size(&self) -> u64 {
        self.shards.total_len()
    }

    /// The index backing this archive.
    pub const fn index(&self) -> &I {
        &self.index
    }

    pub(crate) const fn shards(&self) -> &ShardSet<S> {
        &self.shards
    }

    /// Entries checked by a full scan, or only the last stored entry when
    /// `quick` is set.
    pub(crate) fn entries_to_verify(&self, quick: bool) -> Result<Vec<IndexEntry>> {
        if quick {
            Ok(self.index.last_entry()?.into_iter().collect())
        } else {
            self.index.entries()
        }
    }

    /// Release the index, then every shard.
    ///
    /// Never fails; a failure to close the index is logged and release
    /// continues with the shards.
    pub fn destroy(self) {
        let Self { index, mut shards } = self;
        if let Err(e) = index.close() {
            warn!("Error closing index, continuing: {e}");
        }
        shards.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::shard::{FileShard, MappedShard};
    use crate::test_support::{ArchiveFixture, missing_path, pattern};
    use crate::ErrorKind;

    #[test]
    fn test_init_and_destroy() {
        let mut fixture = ArchiveFixture::new(2);
        fixture.add("/a", 0, &pattern(10, 0));
        fixture.add("/b", 1, &pattern(20, 1));

        let archive =
            Archive::<MappedShard>::init(&fixture.index_path, &fixture.shard_paths).expect("init");
        assert_eq!(archive.num_shards(), 2);
        assert_eq!(archive.shard_len(1), Some(20));
        assert_eq!(archive.total_physical_size(), 30);
        assert_eq!(archive.index().path(), fixture.index_path.as_path());
        assert!(archive.contains("/a").expect("lookup"));
        assert!(!archive.contains("/c").expect("lookup"));
        archive.destroy();
    }

    #[test]
    fn test_init_index_failure_touches_no_shard() {
        let fixture = ArchiveFixture::new(1);
        let err =
            Archive::<FileShard>::init(missing_path(fixture.dir.path()), &fixture.shard_paths)
                .expect_err("missing index");
        assert_eq!(err.kind(), ErrorKind::Index);
    }

    #[test]
    fn test_init_shard_failure_is_io() {
        let fixture = ArchiveFixture::new(3);
        let mut paths = fixture.shard_paths.clone();
        paths[2] = missing_path(fixture.dir.path());

        let err = Archive::<MappedShard>::init(&fixture.index_path, &paths).expect_err("shard 2");
        assert!(err.is_io());
        assert!(matches!(err, ArchiveError::ShardOpen { shard: 2, .. }));
    }

    #[test]
    fn test_stat_not_found() {
        let fixture = ArchiveFixture::new(1);
        let archive = Archive::<FileShard, _>::with_index(MemoryIndex::new(), &fixture.shard_paths)
            .expect("open");
        let err = archive.stat("/missing").expect_err("absent");
        assert!(err.is_not_found());
        archive.destroy();
    }
}
