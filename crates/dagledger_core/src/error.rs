//! Error types for the ledger engine.

use crate::transaction::PayloadError;
use dagledger_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// The five validation variants leave the graph exactly as it was before
/// the failing `submit`. `Persistence` is reported after the in-memory
/// graph has already accepted the transaction.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A listed parent is not in the ledger.
    #[error("transaction {id} references unknown parent {parent}")]
    MissingParent {
        /// The rejected transaction.
        id: String,
        /// The parent id that could not be found.
        parent: String,
    },

    /// A transaction with this id was already admitted.
    #[error("transaction {id} already exists")]
    DuplicateTransaction {
        /// The rejected transaction.
        id: String,
    },

    /// Admitting the transaction would create a cycle.
    #[error("transaction {id} would create a cycle")]
    CycleDetected {
        /// The rejected transaction.
        id: String,
    },

    /// The signature is absent or fails the acceptance policy.
    #[error("transaction {id} has a missing or invalid signature")]
    InvalidSignature {
        /// The rejected transaction.
        id: String,
    },

    /// The payload cannot be stored and reloaded faithfully.
    #[error("transaction {id} has an unstorable payload: {reason}")]
    InvalidPayload {
        /// The rejected transaction.
        id: String,
        /// What is wrong with the payload.
        #[source]
        reason: PayloadError,
    },

    /// Writing the snapshot failed. The in-memory ledger is ahead of disk.
    #[error("snapshot write failed: {source}")]
    Persistence {
        /// The underlying storage failure.
        #[from]
        source: StorageError,
    },

    /// The persisted snapshot could not be read or violates an invariant.
    #[error("corrupt ledger file {location}: {message}")]
    CorruptLedgerFile {
        /// Where the snapshot lives.
        location: String,
        /// What was wrong with it.
        message: String,
    },

    /// Another process holds the ledger directory lock.
    #[error("ledger locked: another process has exclusive access")]
    LedgerLocked,

    /// The ledger directory is unusable.
    #[error("invalid ledger path: {message}")]
    InvalidPath {
        /// Description of the problem.
        message: String,
    },

    /// I/O error while preparing the ledger directory.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LedgerError {
    /// Creates a missing parent error.
    pub fn missing_parent(id: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::MissingParent {
            id: id.into(),
            parent: parent.into(),
        }
    }

    /// Creates a duplicate transaction error.
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::DuplicateTransaction { id: id.into() }
    }

    /// Creates a cycle detected error.
    pub fn cycle(id: impl Into<String>) -> Self {
        Self::CycleDetected { id: id.into() }
    }

    /// Creates an invalid signature error.
    pub fn invalid_signature(id: impl Into<String>) -> Self {
        Self::InvalidSignature { id: id.into() }
    }

    /// Creates an invalid payload error.
    pub fn invalid_payload(id: impl Into<String>, reason: PayloadError) -> Self {
        Self::InvalidPayload {
            id: id.into(),
            reason,
        }
    }

    /// Creates a corrupt ledger file error.
    pub fn corrupt(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptLedgerFile {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Whether this is one of the validation rejections that leave the
    /// ledger untouched.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingParent { .. }
                | Self::DuplicateTransaction { .. }
                | Self::CycleDetected { .. }
                | Self::InvalidSignature { .. }
                | Self::InvalidPayload { .. }
        )
    }

    /// The offending transaction id, for validation errors.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::MissingParent { id, .. }
            | Self::DuplicateTransaction { id }
            | Self::CycleDetected { id }
            | Self::InvalidSignature { id }
            | Self::InvalidPayload { id, .. } => Some(id),
            _ => None,
        }
    }
}
