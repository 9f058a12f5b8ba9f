//! # dagledger Testkit
//!
//! Test utilities for dagledger.
//!
//! This crate provides:
//! - Ledger fixtures and canned scenarios
//! - Property-based generators for valid and invalid DAG histories
//! - Snapshot stores that fail or corrupt on demand
//! - Concurrent submission stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use dagledger_testkit::prelude::*;
//!
//! with_memory_ledger(|ledger| {
//!     scenarios::submit_diamond(ledger);
//!     assert_eq!(ledger.len(), 4);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
