//! Ledger statistics.
//!
//! Counters are atomic and can be read while submissions are in flight.

use crate::error::LedgerError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ledger counters.
#[derive(Debug, Default)]
pub struct LedgerStats {
    submissions: AtomicU64,
    accepted: AtomicU64,
    rejected_missing_parent: AtomicU64,
    rejected_duplicate: AtomicU64,
    rejected_cycle: AtomicU64,
    rejected_signature: AtomicU64,
    rejected_payload: AtomicU64,
    snapshot_writes: AtomicU64,
    snapshot_failures: AtomicU64,
    bytes_written: AtomicU64,
}

impl LedgerStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submission(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a validation rejection. Other errors are ignored.
    pub(crate) fn record_rejection(&self, err: &LedgerError) {
        let counter = match err {
            LedgerError::MissingParent { .. } => &self.rejected_missing_parent,
            LedgerError::DuplicateTransaction { .. } => &self.rejected_duplicate,
            LedgerError::CycleDetected { .. } => &self.rejected_cycle,
            LedgerError::InvalidSignature { .. } => &self.rejected_signature,
            LedgerError::InvalidPayload { .. } => &self.rejected_payload,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot_write(&self, bytes: usize) {
        self.snapshot_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_snapshot_failure(&self) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total `submit` calls.
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Transactions admitted to the graph.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Validation rejections of every kind.
    pub fn rejected(&self) -> u64 {
        self.rejected_missing_parent.load(Ordering::Relaxed)
            + self.rejected_duplicate.load(Ordering::Relaxed)
            + self.rejected_cycle.load(Ordering::Relaxed)
            + self.rejected_signature.load(Ordering::Relaxed)
            + self.rejected_payload.load(Ordering::Relaxed)
    }

    /// Successful snapshot rewrites.
    pub fn snapshot_writes(&self) -> u64 {
        self.snapshot_writes.load(Ordering::Relaxed)
    }

    /// Failed snapshot rewrites.
    pub fn snapshot_failures(&self) -> u64 {
        self.snapshot_failures.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submissions: self.submissions(),
            accepted: self.accepted(),
            rejected_missing_parent: self.rejected_missing_parent.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            rejected_cycle: self.rejected_cycle.load(Ordering::Relaxed),
            rejected_signature: self.rejected_signature.load(Ordering::Relaxed),
            rejected_payload: self.rejected_payload.load(Ordering::Relaxed),
            snapshot_writes: self.snapshot_writes(),
            snapshot_failures: self.snapshot_failures(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`LedgerStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total `submit` calls.
    pub submissions: u64,
    /// Transactions admitted.
    pub accepted: u64,
    /// Rejected for an unknown parent.
    pub rejected_missing_parent: u64,
    /// Rejected as a duplicate id.
    pub rejected_duplicate: u64,
    /// Rejected for closing a cycle.
    pub rejected_cycle: u64,
    /// Rejected by the signature policy.
    pub rejected_signature: u64,
    /// Rejected for a payload that cannot be stored.
    pub rejected_payload: u64,
    /// Successful snapshot rewrites.
    pub snapshot_writes: u64,
    /// Failed snapshot rewrites.
    pub snapshot_failures: u64,
    /// Bytes written across all snapshot rewrites.
    pub bytes_written: u64,
}
