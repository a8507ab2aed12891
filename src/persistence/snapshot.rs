//! Snapshot persistence for marketplace state.
//!
//! A snapshot captures the complete catalog and transaction state at a point
//! in time, so recovery replays only the log suffix written after it instead
//! of the whole history.
//!
//! # Atomic writes
//!
//! Snapshots use the write-to-temp-then-rename pattern:
//! 1. Write to `snapshot.json.tmp`
//! 2. fsync the file
//! 3. Rename to `snapshot.json`
//! 4. fsync the directory
//!
//! Readers therefore always see either the old or the new snapshot, never a
//! partial write.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fsync::{fsync_dir, fsync_file};
use crate::types::{Ticket, TicketId, Transaction, TransactionId};

/// Current schema version. Increment on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Persisted marketplace state.
///
/// Stored as `<data_dir>/snapshot.json`; the companion event log is
/// `<data_dir>/ledger.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Schema version for forward-compatible migrations.
    pub schema_version: u32,

    /// When this snapshot was taken (ISO 8601).
    pub snapshot_at: DateTime<Utc>,

    /// Byte offset in the event log at which this snapshot was taken. On
    /// recovery, seek to this offset and replay forward.
    pub log_position: u64,

    /// Next event sequence number to assign.
    pub next_seq: u64,

    /// Next internal transaction id to assign.
    pub next_transaction_id: u64,

    /// Next ticket id to assign.
    pub next_ticket_id: u64,

    /// The catalog, keyed by ticket id, with current stock.
    pub tickets: HashMap<TicketId, Ticket>,

    /// All transactions ever created, keyed by internal id. Terminal
    /// transactions are retained for audit.
    pub transactions: HashMap<TransactionId, Transaction>,
}

impl MarketSnapshot {
    /// Creates an empty snapshot.
    pub fn empty() -> Self {
        MarketSnapshot {
            schema_version: SCHEMA_VERSION,
            snapshot_at: Utc::now(),
            log_position: 0,
            next_seq: 0,
            next_transaction_id: 1,
            next_ticket_id: 1,
            tickets: HashMap::new(),
            transactions: HashMap::new(),
        }
    }
}

/// Saves a snapshot atomically to disk.
///
/// # Errors
///
/// Returns an error if any IO operation fails.
pub fn save_snapshot_atomic(path: &Path, snapshot: &MarketSnapshot) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// Loads a snapshot from disk, validating the schema version.
///
/// # Errors
///
/// Fails on IO errors, malformed JSON, or a schema version other than
/// [`SCHEMA_VERSION`].
pub fn load_snapshot(path: &Path) -> Result<MarketSnapshot> {
    let bytes = std::fs::read(path)?;
    let snapshot: MarketSnapshot = serde_json::from_slice(&bytes)?;

    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: snapshot.schema_version,
        });
    }

    Ok(snapshot)
}

/// Loads a snapshot if one exists; `Ok(None)` when the file is absent.
pub fn try_load_snapshot(path: &Path) -> Result<Option<MarketSnapshot>> {
    match load_snapshot(path) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(SnapshotError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, Money};
    use tempfile::tempdir;

    fn sample_snapshot() -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::empty();
        snapshot.tickets.insert(
            TicketId(1),
            Ticket::new(TicketId(1), EventId(1), Money(15_000), 30),
        );
        snapshot
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let snapshot = sample_snapshot();
        save_snapshot_atomic(&path, &snapshot).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn try_load_missing_returns_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        assert!(try_load_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        save_snapshot_atomic(&path, &sample_snapshot()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let first = sample_snapshot();
        save_snapshot_atomic(&path, &first).unwrap();

        let mut second = sample_snapshot();
        second.next_transaction_id = 42;
        save_snapshot_atomic(&path, &second).unwrap();

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.next_transaction_id, 42);
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let mut snapshot = sample_snapshot();
        snapshot.schema_version = SCHEMA_VERSION + 1;
        std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::SchemaMismatch { got, .. } if got == SCHEMA_VERSION + 1));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(SnapshotError::Json(_))
        ));
    }
}
