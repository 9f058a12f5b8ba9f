//! File-based snapshot store with atomic replacement.

use crate::backend::SnapshotStore;
use crate::error::StorageResult;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A snapshot store backed by a single file.
///
/// Snapshots are replaced atomically using the write-then-rename pattern:
/// 1. Write the new snapshot to `<path>.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over `<path>`
/// 4. Fsync the parent directory so the rename itself is durable
///
/// A crash at any point leaves either the old or the new snapshot in
/// place, never a truncated one.
///
/// # Example
///
/// ```no_run
/// use dagledger_storage::{FileStore, SnapshotStore};
/// use std::path::Path;
///
/// let mut store = FileStore::open_with_create_dirs(Path::new("data/LEDGER")).unwrap();
/// store.store(b"snapshot bytes").unwrap();
/// assert_eq!(store.load().unwrap().as_deref(), Some(&b"snapshot bytes"[..]));
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    temp_path: PathBuf,
    sync: bool,
}

impl FileStore {
    /// Opens a store at `path`, removing any scratch file left behind by
    /// an interrupted write.
    ///
    /// The snapshot file itself need not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale scratch file cannot be removed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut temp_name = OsString::from(path.as_os_str());
        temp_name.push(".tmp");
        let store = Self {
            path: path.to_path_buf(),
            temp_path: PathBuf::from(temp_name),
            sync: true,
        };

        match fs::remove_file(&store.temp_path) {
            Ok(()) => debug!(path = %store.temp_path.display(), "removed stale snapshot scratch file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(store)
    }

    /// Opens a store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Sets whether each write is fsynced (file and directory).
    ///
    /// Disabling sync keeps the rename atomic but lets the OS decide when
    /// the data reaches disk.
    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the scratch file used during writes.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    #[cfg(unix)]
    fn sync_parent(&self) -> StorageResult<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> StorageResult<()> {
        // NTFS journals metadata; directory handles cannot be fsynced.
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut file = File::create(&self.temp_path)?;
        file.write_all(data)?;
        if self.sync {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&self.temp_path, &self.path)?;

        if self.sync {
            self.sync_parent()?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
