//! Loading and saving the ledger snapshot.
//!
//! Loading rebuilds the graph by replaying every stored record through
//! [`GraphIndex::admit`], in file order. A file that an honest writer could
//! not have produced (unknown parent, duplicate id, cycle, rejected
//! signature) is reported as corrupt instead of being partially loaded.

use crate::error::{LedgerError, LedgerResult};
use crate::graph::GraphIndex;
use crate::signature::SignaturePolicy;
use crate::snapshot::{self, SnapshotFormat};
use dagledger_storage::{SnapshotStore, StorageError};
use tracing::{debug, error};

/// Owns the snapshot store and the write format.
pub struct PersistenceManager {
    store: Box<dyn SnapshotStore>,
    format: SnapshotFormat,
}

impl PersistenceManager {
    /// Wraps a store.
    pub fn new(store: Box<dyn SnapshotStore>, format: SnapshotFormat) -> Self {
        Self { store, format }
    }

    /// Human-readable location of the snapshot.
    #[must_use]
    pub fn location(&self) -> String {
        self.store.location()
    }

    /// The format used for writes.
    #[must_use]
    pub const fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Reads the snapshot and rebuilds the graph.
    ///
    /// An absent snapshot yields an empty graph.
    ///
    /// # Errors
    ///
    /// Returns `CorruptLedgerFile` if the snapshot cannot be read, cannot be
    /// decoded, or a record fails admission.
    pub fn load(&self, policy: &dyn SignaturePolicy) -> LedgerResult<GraphIndex> {
        let location = self.location();

        let data = match self.store.load() {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(%location, "no snapshot found, starting empty");
                return Ok(GraphIndex::new());
            }
            Err(e) => return Err(self.corrupt(format!("unreadable: {e}"))),
        };

        let records = snapshot::decode(&data).map_err(|e| self.corrupt(e.to_string()))?;

        let mut graph = GraphIndex::new();
        for (i, tx) in records.into_iter().enumerate() {
            graph
                .admit(tx, policy)
                .map_err(|e| self.corrupt(format!("record {i}: {e}")))?;
        }

        debug!(
            %location,
            transactions = graph.len(),
            edges = graph.edge_count(),
            "snapshot loaded"
        );
        Ok(graph)
    }

    /// Rewrites the snapshot from the graph's insertion order.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if encoding or the store write fails. The
    /// previous snapshot is left in place by the store.
    pub fn save(&mut self, graph: &GraphIndex) -> LedgerResult<usize> {
        let bytes = snapshot::encode(graph.transactions(), self.format)
            .map_err(StorageError::from)?;
        self.store.store(&bytes)?;
        debug!(
            location = %self.location(),
            transactions = graph.len(),
            bytes = bytes.len(),
            "snapshot written"
        );
        Ok(bytes.len())
    }

    fn corrupt(&self, message: String) -> LedgerError {
        let location = self.location();
        error!(%location, %message, "ledger snapshot is corrupt");
        LedgerError::corrupt(location, message)
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("location", &self.location())
            .field("format", &self.format)
            .finish()
    }
}
