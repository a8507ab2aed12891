//! Durable persistence: append-only event log plus atomic snapshots.
//!
//! The store keeps marketplace state in memory and records every mutation as
//! an event; a snapshot bounds how much log must be replayed on recovery.

pub mod event;
pub mod fsync;
pub mod log;
pub mod snapshot;

pub use event::{LedgerEvent, LedgerEventPayload};
pub use log::{EventLog, EventLogError};
pub use snapshot::{
    MarketSnapshot, SCHEMA_VERSION, SnapshotError, load_snapshot, save_snapshot_atomic,
    try_load_snapshot,
};
