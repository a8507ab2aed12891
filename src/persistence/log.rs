//! Append-only event log with crash-safe replay.
//!
//! The log is JSON Lines: one JSON object per line. Complete lines are
//! always valid JSON, and a partial final line (crash mid-write) is detected
//! and truncated on replay, so the log always contains a valid prefix of
//! events.
//!
//! # Recovery
//!
//! On startup:
//! 1. Load the snapshot to get `log_position`
//! 2. `replay_from(path, log_position)` to replay events past the snapshot
//! 3. An incomplete final line is truncated automatically
//!
//! # fsync strategy
//!
//! Critical events (transaction lifecycle) are fsynced immediately after the
//! write; catalog-seeding events are batched and synced once by the caller.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use super::event::{LedgerEvent, LedgerEventPayload};
use super::fsync::fsync_file;

/// Errors that can occur during event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;

/// An append-only event log.
pub struct EventLog {
    /// The underlying file handle, opened for append.
    file: File,
    /// Path to the log file.
    path: PathBuf,
    /// Next sequence number to assign.
    next_seq: u64,
}

impl EventLog {
    /// Opens an existing log file or creates a new one, with a known next
    /// sequence number (as returned by [`EventLog::replay_from`]).
    pub fn open_with_seq(path: impl AsRef<Path>, next_seq: u64) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;

        Ok(EventLog {
            file,
            path,
            next_seq,
        })
    }

    /// Opens a fresh log starting at sequence zero.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open_with_seq(path, 0)
    }

    /// Appends an event to the log.
    ///
    /// The event gets the next sequence number and the current timestamp.
    /// Critical payloads are fsynced before this returns.
    pub fn append(&mut self, payload: LedgerEventPayload) -> Result<LedgerEvent> {
        let event = LedgerEvent {
            seq: self.next_seq,
            ts: Utc::now(),
            payload,
        };

        let json = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", json)?;

        if event.is_critical() {
            fsync_file(&self.file)?;
        }

        self.next_seq += 1;
        Ok(event)
    }

    /// Forces fsync of the log file. Call after batching non-critical
    /// appends.
    pub fn sync(&self) -> io::Result<()> {
        fsync_file(&self.file)
    }

    /// Current byte position in the log file; recorded in snapshots as
    /// `log_position`.
    pub fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    /// The next sequence number that will be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays events from a byte offset, truncating any partial line at
    /// EOF.
    ///
    /// Returns `(events, next_seq)` where `next_seq` is one past the highest
    /// sequence number seen (or `start_seq` hint of 0 if the file is empty
    /// or missing).
    ///
    /// A final line that does not parse is assumed to be a crash-interrupted
    /// write and the file is truncated at its start. A non-monotonic
    /// sequence number is treated as corruption and truncated the same way.
    pub fn replay_from(path: impl AsRef<Path>, offset: u64) -> Result<(Vec<LedgerEvent>, u64)> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok((vec![], 0));
        }

        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if offset >= file_len {
            return Ok((vec![], 0));
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(offset))?;

        let mut events = Vec::new();
        let mut last_valid_pos = offset;
        let mut current_pos = offset;
        let mut max_seq: Option<u64> = None;

        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;

            if bytes_read == 0 {
                break;
            }

            let line_start = current_pos;
            current_pos += bytes_read as u64;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                last_valid_pos = current_pos;
                continue;
            }

            match serde_json::from_str::<LedgerEvent>(trimmed) {
                Ok(event) => {
                    if max_seq.is_some_and(|prev_max| event.seq <= prev_max) {
                        // Non-monotonic sequence: corruption. Truncate here.
                        break;
                    }
                    max_seq = Some(event.seq);
                    events.push(event);
                    last_valid_pos = current_pos;
                }
                Err(_) => {
                    // Partial line from a crash; truncate at its start.
                    last_valid_pos = line_start;
                    break;
                }
            }
        }

        if last_valid_pos < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(last_valid_pos)?;
            fsync_file(&file)?;
        }

        let next_seq = max_seq.map(|s| s + 1).unwrap_or(0);
        Ok((events, next_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxnRef;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn expired_payload() -> LedgerEventPayload {
        LedgerEventPayload::TransactionExpired {
            reference: TxnRef::generate(),
        }
    }

    // ─── Basic functionality ───

    #[test]
    fn open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        assert!(!path.exists());
        let _log = EventLog::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn append_writes_one_json_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut log = EventLog::open(&path).unwrap();
        let reference = TxnRef::generate();
        log.append(LedgerEventPayload::TransactionExpired { reference })
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let event: LedgerEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event.seq, 0);
        assert!(matches!(
            event.payload,
            LedgerEventPayload::TransactionExpired { reference: r } if r == reference
        ));
    }

    #[test]
    fn sequence_numbers_increment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut log = EventLog::open(&path).unwrap();
        for i in 0..5 {
            let event = log.append(expired_payload()).unwrap();
            assert_eq!(event.seq, i);
        }
        assert_eq!(log.next_seq(), 5);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never-created.log");

        let (events, next_seq) = EventLog::replay_from(&path, 0).unwrap();
        assert!(events.is_empty());
        assert_eq!(next_seq, 0);
    }

    // ─── Crash-safety ───

    #[test]
    fn partial_final_line_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut log = EventLog::open(&path).unwrap();
        log.append(expired_payload()).unwrap();
        log.append(expired_payload()).unwrap();
        drop(log);

        // Simulate a crash mid-write of a third event.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"seq\":2,\"ts\":\"2026-").unwrap();
        drop(file);

        let (events, next_seq) = EventLog::replay_from(&path, 0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(next_seq, 2);

        // The partial line is gone: replaying again sees a clean log.
        let (events_again, _) = EventLog::replay_from(&path, 0).unwrap();
        assert_eq!(events_again.len(), 2);
    }

    #[test]
    fn non_monotonic_sequence_is_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut log = EventLog::open(&path).unwrap();
        log.append(expired_payload()).unwrap();
        log.append(expired_payload()).unwrap();
        drop(log);

        // Append a duplicate seq 0 by hand.
        let duplicate =
            serde_json::to_string(&LedgerEvent::new(0, expired_payload())).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{}", duplicate).unwrap();
        drop(file);

        let (events, next_seq) = EventLog::replay_from(&path, 0).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(next_seq, 2);
    }

    #[test]
    fn replay_from_offset_skips_earlier_events() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.log");

        let mut log = EventLog::open(&path).unwrap();
        log.append(expired_payload()).unwrap();
        let offset = log.position().unwrap();
        log.append(expired_payload()).unwrap();
        drop(log);

        let (events, next_seq) = EventLog::replay_from(&path, offset).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].seq, 1);
        assert_eq!(next_seq, 2);
    }

    // ─── Properties ───

    proptest! {
        /// Write N events, replay yields exactly those N events in order.
        #[test]
        fn roundtrip_n_events(count in 1usize..20) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("ledger.log");

            let mut log = EventLog::open(&path).unwrap();
            let mut written = Vec::new();
            for _ in 0..count {
                written.push(log.append(expired_payload()).unwrap());
            }
            drop(log);

            let (replayed, next_seq) = EventLog::replay_from(&path, 0).unwrap();
            prop_assert_eq!(replayed, written);
            prop_assert_eq!(next_seq, count as u64);
        }

        /// Appending after replay continues the sequence without gaps or
        /// collisions.
        #[test]
        fn append_after_replay_continues_sequence(
            before in 1usize..10,
            after in 1usize..10,
        ) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("ledger.log");

            let mut log = EventLog::open(&path).unwrap();
            for _ in 0..before {
                log.append(expired_payload()).unwrap();
            }
            drop(log);

            let (_, next_seq) = EventLog::replay_from(&path, 0).unwrap();
            let mut log = EventLog::open_with_seq(&path, next_seq).unwrap();
            for _ in 0..after {
                log.append(expired_payload()).unwrap();
            }
            drop(log);

            let (events, _) = EventLog::replay_from(&path, 0).unwrap();
            prop_assert_eq!(events.len(), before + after);
            for (i, event) in events.iter().enumerate() {
                prop_assert_eq!(event.seq, i as u64);
            }
        }
    }
}
