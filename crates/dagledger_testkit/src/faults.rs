//! Fault-injecting snapshot stores.
//!
//! Used to exercise the persistence-failure paths of `submit` and the
//! corrupt-snapshot paths of `open`.

use dagledger_storage::{InMemoryStore, SnapshotStore, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory store whose reads and writes can be made to fail.
///
/// Clones share the same data and switches, so a test can keep one
/// clone as a remote control after handing another to a ledger.
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    writes_until_failure: Arc<AtomicU64>,
    failed_writes: Arc<AtomicU64>,
}

impl FaultyStore {
    /// A healthy, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A healthy store preloaded with snapshot bytes.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: InMemoryStore::with_data(data),
            ..Self::default()
        }
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Lets `n` more writes succeed, then fails all writes.
    pub fn fail_after(&self, n: u64) {
        self.writes_until_failure.store(n + 1, Ordering::SeqCst);
    }

    /// The last successfully stored snapshot.
    pub fn data(&self) -> Option<Vec<u8>> {
        self.inner.data()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.inner.write_count()
    }

    /// Rejected writes so far.
    pub fn failed_writes(&self) -> u64 {
        self.failed_writes.load(Ordering::SeqCst)
    }

    /// A plain store sharing this one's data, without fault switches.
    pub fn healthy_view(&self) -> InMemoryStore {
        self.inner.clone()
    }

    fn write_should_fail(&self) -> bool {
        if self.fail_writes.load(Ordering::SeqCst) {
            return true;
        }
        // 0 = countdown disabled, 1 = exhausted
        match self.writes_until_failure.load(Ordering::SeqCst) {
            0 => false,
            1 => true,
            n => {
                self.writes_until_failure.store(n - 1, Ordering::SeqCst);
                false
            }
        }
    }
}

impl SnapshotStore for FaultyStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        self.inner.load()
    }

    fn store(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.write_should_fail() {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        self.inner.store(data)
    }

    fn location(&self) -> String {
        "faulty-memory".into()
    }
}

/// Flips one bit of `data` at `offset` (modulo its length).
pub fn flip_bit(data: &mut [u8], offset: usize) {
    if data.is_empty() {
        return;
    }
    let i = offset % data.len();
    data[i] ^= 0x01;
}
