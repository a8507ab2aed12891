//! Object storage for payment-proof uploads.
//!
//! The real deployment target is an external object store; the engine only
//! depends on the [`ProofStorage`] capability: hand over the bytes, get back
//! a durable reference. [`FileProofStorage`] is the built-in implementation,
//! writing under the data directory with the same write-temp-then-rename
//! pattern the snapshot store uses, so a crash can never leave a
//! half-written proof behind a committed reference.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::persistence::fsync::{fsync_dir, fsync_file};
use crate::types::{ProofUrl, TxnRef};

/// Errors from storing a proof asset.
#[derive(Debug, Error)]
pub enum ProofStorageError {
    /// The asset could not be written durably.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// The object-storage boundary.
pub trait ProofStorage: Send + Sync {
    /// Durably stores the proof bytes for a transaction and returns a
    /// reference to them.
    ///
    /// Storing again for the same transaction replaces the previous asset —
    /// resubmission while still waiting for payment is allowed.
    fn store(&self, reference: TxnRef, bytes: &[u8]) -> Result<ProofUrl, ProofStorageError>;
}

/// Filesystem-backed proof storage.
#[derive(Debug, Clone)]
pub struct FileProofStorage {
    root: PathBuf,
}

impl FileProofStorage {
    /// Creates the storage rooted at `root`, creating the directory if
    /// needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(FileProofStorage { root })
    }

    fn asset_path(&self, reference: TxnRef) -> PathBuf {
        self.root.join(format!("{}.bin", reference))
    }
}

impl ProofStorage for FileProofStorage {
    fn store(&self, reference: TxnRef, bytes: &[u8]) -> Result<ProofUrl, ProofStorageError> {
        use std::io::Write;

        let path = self.asset_path(reference);
        let tmp_path = path.with_extension("bin.tmp");

        {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(bytes)?;
            fsync_file(&file)?;
        }

        std::fs::rename(&tmp_path, &path)?;
        fsync_dir(&self.root)?;

        Ok(ProofUrl::new(format!("file://{}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn stores_bytes_and_returns_resolvable_reference() {
        let dir = tempdir().unwrap();
        let storage = FileProofStorage::new(dir.path().join("proofs")).unwrap();
        let reference = TxnRef::generate();

        let url = storage.store(reference, b"receipt image bytes").unwrap();

        let path = url.as_str().strip_prefix("file://").unwrap();
        let stored = std::fs::read(path).unwrap();
        assert_eq!(stored, b"receipt image bytes");
    }

    #[test]
    fn resubmission_replaces_the_asset() {
        let dir = tempdir().unwrap();
        let storage = FileProofStorage::new(dir.path().join("proofs")).unwrap();
        let reference = TxnRef::generate();

        let first = storage.store(reference, b"first").unwrap();
        let second = storage.store(reference, b"second").unwrap();
        assert_eq!(first, second);

        let path = second.as_str().strip_prefix("file://").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("proofs");
        let storage = FileProofStorage::new(&root).unwrap();

        storage.store(TxnRef::generate(), b"bytes").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(&root)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn distinct_transactions_get_distinct_assets() {
        let dir = tempdir().unwrap();
        let storage = FileProofStorage::new(dir.path().join("proofs")).unwrap();

        let a = storage.store(TxnRef::generate(), b"a").unwrap();
        let b = storage.store(TxnRef::generate(), b"b").unwrap();
        assert_ne!(a, b);
    }
}
