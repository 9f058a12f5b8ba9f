//! In-memory snapshot store for testing.

use crate::backend::SnapshotStore;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory snapshot store.
///
/// Clones share the same underlying snapshot, so a test can hand one
/// clone to a ledger and later open a second ledger from another clone
/// to simulate a restart.
///
/// # Example
///
/// ```rust
/// use dagledger_storage::{InMemoryStore, SnapshotStore};
///
/// let mut store = InMemoryStore::new();
/// let observer = store.clone();
/// store.store(b"snapshot").unwrap();
/// assert_eq!(observer.data().as_deref(), Some(&b"snapshot"[..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<Option<Vec<u8>>>,
    writes: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a snapshot.
    ///
    /// Useful for testing load and corruption handling.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let store = Self::default();
        *store.inner.data.write() = Some(data);
        store
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn data(&self) -> Option<Vec<u8>> {
        self.inner.data.read().clone()
    }

    /// Number of successful `store` calls across all clones.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data())
    }

    fn store(&mut self, data: &[u8]) -> StorageResult<()> {
        *self.inner.data.write() = Some(data.to_vec());
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
