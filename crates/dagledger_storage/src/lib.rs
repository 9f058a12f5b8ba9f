//! # dagledger Storage
//!
//! Snapshot storage backends for dagledger.
//!
//! The ledger persists itself as one self-contained snapshot that is
//! rewritten in full after every accepted transaction. Stores here are
//! **opaque blob holders**: they load and replace that blob and nothing
//! else.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral ledgers
//! - [`FileStore`] - Durable, atomically replaced file
//!
//! ## Example
//!
//! ```rust
//! use dagledger_storage::{SnapshotStore, InMemoryStore};
//!
//! let mut store = InMemoryStore::new();
//! store.store(b"hello world").unwrap();
//! assert_eq!(store.load().unwrap().unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::SnapshotStore;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
