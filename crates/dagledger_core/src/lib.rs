//! # dagledger Core
//!
//! Transaction ledger engine organised as a directed acyclic graph.
//!
//! This crate provides:
//! - The [`Transaction`] record and its canonical content hash
//! - The graph index with atomic validate-and-insert
//! - Whole-snapshot persistence, replayed through validation on load
//! - Closure, ordering and lookup queries
//!
//! ## Example
//!
//! ```rust
//! use dagledger_core::{Ledger, Transaction};
//!
//! let ledger = Ledger::open_in_memory()?;
//! for (id, parents) in [("tx0", vec![]), ("tx1", vec!["tx0"]), ("tx2", vec!["tx0"])] {
//!     ledger.submit(
//!         Transaction::builder(id)
//!             .parents(parents)
//!             .signature("signature_valid_123456")
//!             .build(),
//!     )?;
//! }
//! assert_eq!(ledger.descendants("tx0").len(), 2);
//! # Ok::<(), dagledger_core::LedgerError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
#[cfg(feature = "std")]
mod dir;
mod error;
mod graph;
mod ledger;
mod persistence;
mod signature;
pub mod snapshot;
mod stats;
mod transaction;

pub use config::{Config, DEFAULT_MIN_SIGNATURE_LEN};
pub use error::{LedgerError, LedgerResult};
pub use graph::{GraphIndex, NodeHandle};
pub use ledger::{Ledger, VerifyReport};
pub use persistence::PersistenceManager;
pub use signature::{MinLengthPolicy, SignaturePolicy};
pub use snapshot::{SnapshotError, SnapshotFormat};
pub use stats::{LedgerStats, StatsSnapshot};
pub use transaction::{
    now_timestamp, ContentHash, Payload, PayloadError, Transaction, TransactionBuilder, MAX_PAYLOAD_DEPTH,
};

pub use dagledger_codec::Value;
