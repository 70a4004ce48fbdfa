//! Shared fixtures for integration tests.

#![allow(dead_code)]

use barecat_reader::{LocationRecord, index_path, shard_path};
use rusqlite::{Connection, params};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// An archive written to a temporary directory.
pub struct TestArchive {
    pub dir: TempDir,
    pub base: PathBuf,
    pub index_path: PathBuf,
    pub shard_paths: Vec<PathBuf>,
    pub entries: Vec<(String, LocationRecord, Vec<u8>)>,
}

/// Pack `entries` round-robin into `num_shards` shards, the way the archive
/// builder lays them out: contiguous, in insertion order.
pub fn build_archive(num_shards: usize, entries: &[(String, Vec<u8>)]) -> TestArchive {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let base = dir.path().join("dataset");
    let index_path = index_path(&base);
    let shard_paths: Vec<PathBuf> = (0..num_shards).map(|i| shard_path(&base, i)).collect();

    let mut shards: Vec<File> = shard_paths
        .iter()
        .map(|p| File::create(p).expect("Failed to create shard"))
        .collect();
    let mut offsets = vec![0u64; num_shards];

    let conn = Connection::open(&index_path).expect("Failed to create index");
    conn.execute(
        "CREATE TABLE files (path TEXT PRIMARY KEY, shard INTEGER NOT NULL, \
         offset INTEGER NOT NULL, size INTEGER NOT NULL, crc32c INTEGER)",
        [],
    )
    .expect("Failed to create files table");

    let mut written = Vec::with_capacity(entries.len());
    for (i, (path, data)) in entries.iter().enumerate() {
        let shard = i % num_shards;
        shards[shard].write_all(data).expect("Failed to write entry");
        let crc = crc32c::crc32c(data);
        let record = LocationRecord::new(shard as u32, offsets[shard], data.len() as u64, crc);
        offsets[shard] += data.len() as u64;

        conn.execute(
            "INSERT INTO files (path, shard, offset, size, crc32c) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                path,
                record.shard,
                record.offset as i64,
                record.size as i64,
                i64::from(crc)
            ],
        )
        .expect("Failed to index entry");
        written.push((path.clone(), record, data.clone()));
    }
    drop(conn);

    TestArchive {
        dir,
        base,
        index_path,
        shard_paths,
        entries: written,
    }
}

/// Deterministic pseudo-random bytes.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
