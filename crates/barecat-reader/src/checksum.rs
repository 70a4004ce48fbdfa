//! CRC32C (Castagnoli) helpers for explicit integrity checks

use crate::index::IndexEntry;
use crate::{ArchiveError, LocationRecord, Result};
use tracing::{debug, warn};

/// An entry whose bytes do not match its stored CRC32C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptEntry {
    /// Logical path of the entry
    pub path: String,
    /// Location and stored checksum
    pub record: LocationRecord,
    /// CRC32C of the bytes actually stored
    pub actual: u32,
}

/// CRC32C of `data`, seeded with zero.
pub fn crc32c(data: &[u8]) -> u32 {
    ::crc32c::crc32c(data)
}

/// Compare the checksum of `data` against the one stored in `record`.
///
/// Records without a stored checksum pass unconditionally.
pub fn verify_entry(path: &str, record: &LocationRecord, data: &[u8]) -> Result<()> {
    let Some(expected) = record.checksum else {
        return Ok(());
    };
    let actual = crc32c(data);
    if actual == expected {
        return Ok(());
    }
    debug!(
        path,
        shard = record.shard,
        offset = record.offset,
        expected,
        actual,
        "CRC32C mismatch"
    );
    Err(ArchiveError::ChecksumMismatch {
        path: path.to_string(),
        expected,
        actual,
    })
}

/// Checksum every entry that stores a CRC32C and collect the mismatches.
///
/// `checksum_of` computes the CRC32C of a record's bytes; its errors abort
/// the scan.
pub(crate) fn find_corrupt<F>(
    entries: Vec<IndexEntry>,
    mut checksum_of: F,
) -> Result<Vec<CorruptEntry>>
where
    F: FnMut(&LocationRecord) -> Result<u32>,
{
    let mut checked = 0usize;
    let mut corrupt = Vec::new();
    for (path, record) in entries {
        let Some(expected) = record.checksum else {
            continue;
        };
        let actual = checksum_of(&record)?;
        checked += 1;
        if actual != expected {
            warn!(
                path,
                shard = record.shard,
                offset = record.offset,
                expected,
                actual,
                "CRC32C mismatch"
            );
            corrupt.push(CorruptEntry {
                path,
                record,
                actual,
            });
        }
    }
    debug!(checked, corrupt = corrupt.len(), "Verified entries");
    Ok(corrupt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Standard CRC-32C check value
        assert_eq!(crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn test_verify_entry() {
        let data = b"hello barecat";
        let good = LocationRecord::new(0, 0, data.len() as u64, crc32c(data));
        assert!(verify_entry("/a", &good, data).is_ok());

        let bad = LocationRecord::new(0, 0, data.len() as u64, 0xDEAD_BEEF);
        let err = verify_entry("/a", &bad, data).expect_err("mismatch");
        assert!(matches!(
            err,
            ArchiveError::ChecksumMismatch {
                expected: 0xDEAD_BEEF,
                ..
            }
        ));

        let unchecked = LocationRecord::without_checksum(0, 0, data.len() as u64);
        assert!(verify_entry("/a", &unchecked, data).is_ok());
    }

    #[test]
    fn test_find_corrupt_skips_unchecked_entries() {
        let entries = vec![
            ("/good".to_string(), LocationRecord::new(0, 0, 4, 11)),
            ("/bad".to_string(), LocationRecord::new(0, 4, 4, 12)),
            ("/none".to_string(), LocationRecord::without_checksum(0, 8, 4)),
        ];
        let mut seen = Vec::new();
        let corrupt = find_corrupt(entries, |record| {
            seen.push(record.offset);
            Ok(11)
        })
        .expect("scan");

        assert_eq!(seen, vec![0, 4]);
        assert_eq!(
            corrupt,
            vec![CorruptEntry {
                path: "/bad".to_string(),
                record: LocationRecord::new(0, 4, 4, 12),
                actual: 11,
            }]
        );
    }

    #[test]
    fn test_find_corrupt_stops_on_read_error() {
        let entries = vec![("/a".to_string(), LocationRecord::new(3, 0, 4, 0))];
        let err = find_corrupt(entries, |_| {
            Err(ArchiveError::InvalidArgument("no shard 3".to_string()))
        })
        .expect_err("read error");
        assert!(err.is_invalid_argument());
    }
}
