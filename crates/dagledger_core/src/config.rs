//! Ledger configuration.

use crate::snapshot::SnapshotFormat;

/// Default minimum signature length accepted by [`crate::MinLengthPolicy`].
pub const DEFAULT_MIN_SIGNATURE_LEN: usize = 10;

/// Configuration for opening a ledger.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the ledger directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Minimum signature length for the default signature policy.
    pub min_signature_len: usize,

    /// Whether to fsync the snapshot and its directory on every rewrite.
    pub sync_on_write: bool,

    /// Format used when writing snapshots. Reads accept either format.
    pub snapshot_format: SnapshotFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            min_signature_len: DEFAULT_MIN_SIGNATURE_LEN,
            sync_on_write: true,
            snapshot_format: SnapshotFormat::Cbor,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the ledger directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the minimum accepted signature length.
    #[must_use]
    pub const fn min_signature_len(mut self, len: usize) -> Self {
        self.min_signature_len = len;
        self
    }

    /// Sets whether each snapshot rewrite is fsynced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the snapshot format for writes.
    #[must_use]
    pub const fn snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshot_format = format;
        self
    }
}
