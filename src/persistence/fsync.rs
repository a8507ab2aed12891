//! Low-level fsync operations for durability.
//!
//! Reservation accounting must survive a crash: a transaction that holds
//! stock but was never persisted (or vice versa) corrupts the inventory.
//! These helpers make file writes and renames durable before the store
//! acknowledges an operation.
//!
//! Directory fsync matters as much as file fsync: on POSIX, a created or
//! renamed file is only durable once its directory entry is, and that
//! requires syncing the directory itself.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk (`fsync(2)`).
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory, making create/rename/delete entries durable.
///
/// # Errors
///
/// Returns an error if the path cannot be opened or the fsync call fails.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}
