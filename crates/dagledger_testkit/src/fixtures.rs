//! Test fixtures and ledger helpers.
//!
//! Provides convenience functions for setting up test ledgers
//! and common test scenarios.

use dagledger_core::{Config, Ledger, SnapshotFormat, Transaction};
use std::path::Path;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// A signature every default policy accepts.
pub const VALID_SIGNATURE: &str = "signature_valid_123456";

/// Fixed timestamp so fixtures hash identically across runs.
pub const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00.000000Z";

/// A test ledger with automatic cleanup.
pub struct TestLedger {
    /// The ledger instance.
    pub ledger: Ledger,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
    config: Config,
}

impl TestLedger {
    /// Creates a new in-memory test ledger.
    pub fn memory() -> Self {
        Self {
            ledger: Ledger::open_in_memory().expect("Failed to open in-memory ledger"),
            temp_dir: None,
            config: Config::default(),
        }
    }

    /// Creates a new directory-backed test ledger writing CBOR snapshots.
    pub fn file() -> Self {
        Self::file_with_config(Config::default().sync_on_write(false))
    }

    /// Creates a new directory-backed test ledger writing JSON snapshots.
    pub fn json_file() -> Self {
        Self::file_with_config(
            Config::default()
                .sync_on_write(false)
                .snapshot_format(SnapshotFormat::Json),
        )
    }

    /// Creates a directory-backed test ledger with custom configuration.
    pub fn file_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let ledger = Ledger::open_with_config(temp_dir.path(), config.clone())
            .expect("Failed to open file ledger");
        Self {
            ledger,
            temp_dir: Some(temp_dir),
            config,
        }
    }

    /// Returns the ledger directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the ledger and opens it again from disk.
    ///
    /// Panics for in-memory ledgers, which have nothing to reopen.
    pub fn reopen(self) -> Self {
        let Self {
            ledger,
            temp_dir,
            config,
        } = self;
        let temp_dir = temp_dir.expect("In-memory ledgers cannot be reopened");
        drop(ledger);

        let ledger = Ledger::open_with_config(temp_dir.path(), config.clone())
            .expect("Failed to reopen file ledger");
        Self {
            ledger,
            temp_dir: Some(temp_dir),
            config,
        }
    }
}

impl std::ops::Deref for TestLedger {
    type Target = Ledger;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

/// Runs a test with a temporary in-memory ledger.
pub fn with_memory_ledger<F, R>(f: F) -> R
where
    F: FnOnce(&Ledger) -> R,
{
    let test_ledger = TestLedger::memory();
    f(&test_ledger.ledger)
}

/// Runs a test with a temporary directory-backed ledger.
pub fn with_file_ledger<F, R>(f: F) -> R
where
    F: FnOnce(&Ledger, &Path) -> R,
{
    let test_ledger = TestLedger::file();
    let path = test_ledger.path().expect("File ledger should have a path");
    f(&test_ledger.ledger, path)
}

/// A validly signed transaction with a fixed timestamp and small payload.
pub fn signed(id: &str, parents: &[&str]) -> Transaction {
    Transaction::builder(id)
        .parents(parents.iter().copied())
        .payload_entry("amount", 100)
        .signature(VALID_SIGNATURE)
        .timestamp(FIXED_TIMESTAMP)
        .build()
}

/// A transaction with no signature at all.
pub fn unsigned(id: &str, parents: &[&str]) -> Transaction {
    Transaction::builder(id)
        .parents(parents.iter().copied())
        .timestamp(FIXED_TIMESTAMP)
        .build()
}

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; later calls are no-ops.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Ids of the diamond scenario in submission order.
    pub const DIAMOND: [&str; 4] = ["tx0", "tx1", "tx2", "tx3"];

    /// Submits `tx0`, then `tx1` and `tx2` on `tx0`, then `tx3` on both.
    pub fn submit_diamond(ledger: &Ledger) {
        ledger.submit(signed("tx0", &[])).expect("tx0");
        ledger.submit(signed("tx1", &["tx0"])).expect("tx1");
        ledger.submit(signed("tx2", &["tx0"])).expect("tx2");
        ledger.submit(signed("tx3", &["tx1", "tx2"])).expect("tx3");
    }

    /// Submits a linear chain `c0 <- c1 <- ... <- c{len-1}`.
    pub fn submit_chain(ledger: &Ledger, len: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(len);
        for i in 0..len {
            let id = format!("c{i}");
            let parents: Vec<&str> = ids.last().map(String::as_str).into_iter().collect();
            ledger.submit(signed(&id, &parents)).expect("chain link");
            ids.push(id);
        }
        ids
    }

    /// Creates an in-memory ledger holding the diamond.
    pub fn diamond_ledger() -> TestLedger {
        let ledger = TestLedger::memory();
        submit_diamond(&ledger);
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture_starts_empty() {
        let ledger = TestLedger::memory();
        assert!(ledger.is_empty());
        assert!(ledger.path().is_none());
    }

    #[test]
    fn file_fixture_reopens() {
        let ledger = TestLedger::file();
        scenarios::submit_diamond(&ledger);
        let ledger = ledger.reopen();
        assert_eq!(ledger.topological_order(), scenarios::DIAMOND);
    }

    #[test]
    fn chain_scenario() {
        with_memory_ledger(|ledger| {
            let ids = scenarios::submit_chain(ledger, 5);
            assert_eq!(ledger.topological_order(), ids);
            assert_eq!(ledger.tips(), ["c4"]);
        });
    }
}
