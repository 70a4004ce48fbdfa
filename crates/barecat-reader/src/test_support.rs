//! Archive fixtures for unit tests.

use crate::LocationRecord;
use crate::checksum::crc32c;
use rusqlite::{Connection, params};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) const CREATE_FILES_TABLE: &str = "CREATE TABLE files (
    path TEXT PRIMARY KEY,
    shard INTEGER NOT NULL,
    offset INTEGER NOT NULL,
    size INTEGER NOT NULL,
    crc32c INTEGER
)";

/// Writes shard files and a SQLite index into a temporary directory.
pub(crate) struct ArchiveFixture {
    pub dir: TempDir,
    pub index_path: PathBuf,
    pub shard_paths: Vec<PathBuf>,
    conn: Connection,
}

impl ArchiveFixture {
    pub fn new(num_shards: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = dir.path().join("archive");
        let index_path = PathBuf::from(format!("{}-sqlite-index", base.display()));
        let shard_paths: Vec<PathBuf> = (0..num_shards)
            .map(|i| PathBuf::from(format!("{}-shard-{i:05}", base.display())))
            .collect();
        for path in &shard_paths {
            File::create(path).expect("Failed to create shard");
        }
        let conn = Connection::open(&index_path).expect("Failed to create index");
        conn.execute(CREATE_FILES_TABLE, [])
            .expect("Failed to create files table");
        Self {
            dir,
            index_path,
            shard_paths,
            conn,
        }
    }

    pub fn shard_len(&self, shard: usize) -> u64 {
        std::fs::metadata(&self.shard_paths[shard])
            .expect("Failed to stat shard")
            .len()
    }

    /// Append raw bytes to a shard without indexing them.
    pub fn pad(&mut self, shard: usize, len: usize) {
        self.append(shard, &vec![0xEE; len]);
    }

    /// Append an entry to a shard and index it.
    pub fn add(&mut self, path: &str, shard: usize, data: &[u8]) -> LocationRecord {
        let offset = self.shard_len(shard);
        self.append(shard, data);
        let record = LocationRecord::new(shard as u32, offset, data.len() as u64, crc32c(data));
        self.insert_raw(
            path,
            i64::from(record.shard),
            offset as i64,
            data.len() as i64,
            Some(i64::from(crc32c(data))),
        );
        record
    }

    /// Index a row verbatim, bypassing any consistency with the shards.
    pub fn insert_raw(&self, path: &str, shard: i64, offset: i64, size: i64, crc: Option<i64>) {
        self.conn
            .execute(
                "INSERT INTO files (path, shard, offset, size, crc32c) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![path, shard, offset, size, crc],
            )
            .expect("Failed to insert row");
    }

    pub fn base(&self) -> PathBuf {
        self.dir.path().join("archive")
    }

    fn append(&self, shard: usize, data: &[u8]) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.shard_paths[shard])
            .expect("Failed to open shard for append");
        file.write_all(data).expect("Failed to append to shard");
    }
}

pub(crate) fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

pub(crate) fn missing_path(dir: &Path) -> PathBuf {
    dir.join("does-not-exist")
}
