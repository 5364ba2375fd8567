//! Header window persistence.
//!
//! Fetching block headers over JSON-RPC is slow, so the monitor's window is
//! saved to disk and restored across process restarts. The format is a JSON
//! table of `{block_number, block_hash, timestamp}` rows, order-independent,
//! loadable back into an exact duplicate of the original window.
//!
//! ## Example
//!
//! ```no_run
//! use eth_reorg_scanner::snapshot::HeaderSnapshot;
//! use std::path::Path;
//!
//! # fn example() -> eth_reorg_scanner::error::ScanResult<()> {
//! let snapshot = HeaderSnapshot::load(Path::new("./headers.json"))?;
//! println!("Snapshot holds {} headers", snapshot.len());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ScanResult, ScannerError};
use crate::monitor::buffer::BlockHeader;

/// A persisted copy of the monitor's header window.
///
/// Row order carries no meaning; restoring sorts by block number and
/// re-validates the no-gap invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSnapshot {
    /// One row per tracked block
    headers: Vec<BlockHeader>,
}

impl HeaderSnapshot {
    /// Build a snapshot from a sequence of headers.
    #[must_use]
    pub fn from_headers(headers: impl IntoIterator<Item = BlockHeader>) -> Self {
        Self {
            headers: headers.into_iter().collect(),
        }
    }

    /// The captured header rows.
    #[must_use]
    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    /// Number of captured headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the snapshot holds no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Write the snapshot to a JSON file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns a [`ScannerError::SnapshotError`] on serialization or I/O
    /// failure.
    pub fn save(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ScannerError::snapshot(
                    format!("Failed to create snapshot directory {}", parent.display()),
                    Some(Box::new(e)),
                )
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ScannerError::snapshot("Failed to serialize header snapshot", Some(Box::new(e)))
        })?;

        fs::write(path, json).map_err(|e| {
            ScannerError::snapshot(
                format!("Failed to write snapshot to {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        info!(
            path = %path.display(),
            headers = self.headers.len(),
            "Header snapshot saved"
        );
        Ok(())
    }

    /// Read a snapshot back from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`ScannerError::SnapshotError`] if the file is missing,
    /// unreadable, or not valid snapshot JSON.
    pub fn load(path: &Path) -> ScanResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            ScannerError::snapshot(
                format!("Failed to read snapshot from {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        let snapshot: Self = serde_json::from_str(&json).map_err(|e| {
            ScannerError::snapshot(
                format!("Failed to parse snapshot file {}", path.display()),
                Some(Box::new(e)),
            )
        })?;

        debug!(
            path = %path.display(),
            headers = snapshot.headers.len(),
            "Header snapshot loaded"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use tempfile::tempdir;

    fn header(number: u64) -> BlockHeader {
        BlockHeader::new(number, B256::with_last_byte(number as u8), 1_700_000_000 + number)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("headers.json");

        let snapshot = HeaderSnapshot::from_headers((10..20).map(header));
        snapshot.save(&path).unwrap();

        let loaded = HeaderSnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.len(), 10);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/headers.json");

        let snapshot = HeaderSnapshot::from_headers(vec![header(1)]);
        snapshot.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");

        let err = HeaderSnapshot::load(&path).unwrap_err();
        assert!(matches!(err, ScannerError::SnapshotError { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(HeaderSnapshot::load(&path).is_err());
    }

    #[test]
    fn test_json_format_contains_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("headers.json");

        HeaderSnapshot::from_headers(vec![header(7)])
            .save(&path)
            .unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"number\""));
        assert!(json.contains("\"hash\""));
        assert!(json.contains("\"timestamp\""));
    }
}
