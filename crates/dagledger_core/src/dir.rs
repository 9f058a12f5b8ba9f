//! Ledger directory management.
//!
//! An on-disk ledger is a directory:
//!
//! ```text
//! <ledger_path>/
//! ├─ LEDGER        # Current snapshot
//! ├─ LEDGER.tmp    # Snapshot being written (transient)
//! └─ LOCK          # Advisory lock for single-process access
//! ```
//!
//! The LOCK file ensures only one process has the ledger open at a time.

use crate::error::{LedgerError, LedgerResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "LEDGER";
const LOCK_FILE: &str = "LOCK";

/// Holds the ledger directory and its exclusive lock.
///
/// The lock is released when this value is dropped.
#[derive(Debug)]
pub struct LedgerDir {
    path: PathBuf,
    _lock_file: File,
}

impl LedgerDir {
    /// Opens or creates a ledger directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false (`InvalidPath`)
    /// - The path exists but is not a directory (`InvalidPath`)
    /// - Another process holds the lock (`LedgerLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> LedgerResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(LedgerError::invalid_path(format!(
                    "ledger directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(LedgerError::invalid_path(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(LedgerError::LedgerLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// The ledger directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }
}
