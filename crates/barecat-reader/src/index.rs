//! Index lookup: logical path to physical location
//!
//! The archive builder writes a SQLite database with one row per entry in a
//! `files` table. [`SqliteIndex`] reads that database; [`MemoryIndex`] is an
//! ordered in-memory map with the same contract.

use crate::{ArchiveError, LocationRecord, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, named_params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The single lookup query prepared against the index.
pub const LOOKUP_QUERY: &str = "SELECT shard, offset, size, crc32c FROM files WHERE path = :path";

const ENTRIES_QUERY: &str =
    "SELECT path, shard, offset, size, crc32c FROM files ORDER BY shard, offset";

const LAST_ENTRY_QUERY: &str = "SELECT path, shard, offset, size, crc32c FROM files \
     ORDER BY shard DESC, offset DESC LIMIT 1";

/// A logical path paired with its location.
pub type IndexEntry = (String, LocationRecord);

/// Exact-key lookup from a logical path to its [`LocationRecord`].
pub trait IndexLookup {
    /// Look up `path`, returning `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be queried or the stored row is corrupt
    fn lookup(&self, path: &str) -> Result<Option<LocationRecord>>;

    /// Every indexed entry.
    ///
    /// # Errors
    ///
    /// Returns error if the index cannot be queried or a stored row is corrupt
    fn entries(&self) -> Result<Vec<IndexEntry>>;

    /// The entry stored last: highest shard, then highest offset.
    ///
    /// # Errors
    ///
    /// As [`entries`](Self::entries)
    fn last_entry(&self) -> Result<Option<IndexEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .max_by_key(|(_, record)| (record.shard, record.offset)))
    }

    /// Release the index.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying store reports a failure on close
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Read-only SQLite index.
///
/// Lookups reuse one cached prepared statement. The connection sits behind
/// a mutex so that an archive may be shared between threads; lookups are
/// serialized, reads from mapped shards are not.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteIndex {
    /// Open the index read-only and prepare the lookup query.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or lacks the `files` table
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .inspect_err(|e| debug!("Cannot open index {}: {e}", path.display()))?;

        // Preparing up front surfaces a missing table before any shard is opened.
        conn.prepare_cached(LOOKUP_QUERY)
            .inspect_err(|e| debug!("Cannot prepare lookup on {}: {e}", path.display()))?;

        debug!("Opened index {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path of the index database.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl IndexLookup for SqliteIndex {
    fn lookup(&self, path: &str) -> Result<Option<LocationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(LOOKUP_QUERY)?;
        let row = stmt
            .query_row(named_params! { ":path": path }, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })
            .optional()?;

        row.map(|(shard, offset, size, crc)| decode_row(path, shard, offset, size, crc))
            .transpose()
    }

    fn entries(&self) -> Result<Vec<IndexEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(ENTRIES_QUERY)?;
        let rows = stmt.query_map([], read_entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            let (path, shard, offset, size, crc) = row?;
            let record = decode_row(&path, shard, offset, size, crc)?;
            entries.push((path, record));
        }
        debug!("Listed {} entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }

    fn last_entry(&self) -> Result<Option<IndexEntry>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(LAST_ENTRY_QUERY, [], read_entry_row)
            .optional()?;

        row.map(|(path, shard, offset, size, crc)| {
            decode_row(&path, shard, offset, size, crc).map(|record| (path, record))
        })
        .transpose()
    }

    fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.into_inner().close().map_err(|(_, e)| {
            debug!("Failed to close index {}: {e}", path.display());
            ArchiveError::Index(e)
        })
    }
}

type EntryRow = (String, i64, i64, i64, Option<i64>);

fn read_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn decode_row(
    path: &str,
    shard: i64,
    offset: i64,
    size: i64,
    crc: Option<i64>,
) -> Result<LocationRecord> {
    let corrupt = |reason: String| ArchiveError::CorruptRecord {
        path: path.to_string(),
        reason,
    };

    let shard = u32::try_from(shard).map_err(|_| corrupt(format!("shard {shard}")))?;
    let offset = u64::try_from(offset).map_err(|_| corrupt(format!("offset {offset}")))?;
    let size = u64::try_from(size).map_err(|_| corrupt(format!("size {size}")))?;
    let checksum = crc
        .map(|crc| u32::try_from(crc).map_err(|_| corrupt(format!("crc32c {crc}"))))
        .transpose()?;

    Ok(LocationRecord {
        shard,
        offset,
        size,
        checksum,
    })
}

/// Ordered in-memory index.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    entries: BTreeMap<String, LocationRecord>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `path`.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        record: LocationRecord,
    ) -> Option<LocationRecord> {
        self.entries.insert(path.into(), record)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over indexed paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<P: Into<String>> FromIterator<(P, LocationRecord)> for MemoryIndex {
    fn from_iter<T: IntoIterator<Item = (P, LocationRecord)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(p, r)| (p.into(), r)).collect(),
        }
    }
}

impl IndexLookup for MemoryIndex {
    fn lookup(&self, path: &str) -> Result<Option<LocationRecord>> {
        Ok(self.entries.get(path).copied())
    }

    fn entries(&self) -> Result<Vec<IndexEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|(path, record)| (path.clone(), *record))
            .collect())
    }
}
