//! Snapshot store trait definition.

use crate::error::StorageResult;

/// A durable home for one opaque snapshot blob.
///
/// Stores do not interpret the bytes they hold; the ledger owns the
/// snapshot format. Every `store` replaces the previous snapshot as a
/// whole.
///
/// # Invariants
///
/// - `load` returns `None` until the first successful `store`
/// - after `store(data)` returns `Ok`, `load` returns exactly `data`
/// - a failed `store` leaves the previous snapshot readable
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - Atomic write-then-rename on the file system
pub trait SnapshotStore: Send + Sync {
    /// Reads the current snapshot, if one has ever been stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the stored snapshot with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new snapshot could not be made durable.
    fn store(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Human-readable location used in log lines and error messages.
    fn location(&self) -> String;
}
