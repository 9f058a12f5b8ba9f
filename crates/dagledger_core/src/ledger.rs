//! The ledger facade.

use crate::config::Config;
#[cfg(feature = "std")]
use crate::dir::LedgerDir;
use crate::error::{LedgerError, LedgerResult};
use crate::graph::GraphIndex;
use crate::persistence::PersistenceManager;
use crate::signature::{MinLengthPolicy, SignaturePolicy};
use crate::stats::{LedgerStats, StatsSnapshot};
use crate::transaction::{ContentHash, Transaction};
use dagledger_storage::{InMemoryStore, SnapshotStore};
use parking_lot::Mutex;
use std::collections::BTreeSet;
#[cfg(feature = "std")]
use std::path::Path;
use tracing::{info, warn};

/// A transaction ledger organised as a directed acyclic graph.
///
/// Every transaction names the transactions it depends on. `submit`
/// enforces that the graph stays well formed: parents exist, ids are
/// unique, there are no cycles, and each signature satisfies the
/// configured policy. After each accepted transaction the full snapshot
/// is rewritten.
///
/// # Concurrency
///
/// `Ledger` is `Send + Sync`. Every operation, reads included, takes one
/// exclusive lock for its whole duration, and `submit` holds it across the
/// snapshot write. Operations never observe a half-admitted transaction.
///
/// # Example
///
/// ```rust
/// use dagledger_core::{Ledger, Transaction};
///
/// let ledger = Ledger::open_in_memory()?;
/// ledger.submit(Transaction::builder("tx0").signature("signature_valid_0").build())?;
/// ledger.submit(
///     Transaction::builder("tx1")
///         .parent("tx0")
///         .signature("signature_valid_1")
///         .build(),
/// )?;
///
/// assert_eq!(ledger.children("tx0"), ["tx1"]);
/// assert_eq!(ledger.topological_order(), ["tx0", "tx1"]);
/// # Ok::<(), dagledger_core::LedgerError>(())
/// ```
pub struct Ledger {
    config: Config,
    /// Holds the directory lock. `None` for ledgers not opened from a path.
    #[cfg(feature = "std")]
    _dir: Option<LedgerDir>,
    inner: Mutex<Inner>,
    policy: Box<dyn SignaturePolicy>,
    stats: LedgerStats,
}

struct Inner {
    graph: GraphIndex,
    persistence: PersistenceManager,
}

/// Result of [`Ledger::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of transactions.
    pub nodes: usize,
    /// Number of parent-child edges.
    pub edges: usize,
    /// Number of transactions without parents.
    pub roots: usize,
    /// Number of transactions without children.
    pub tips: usize,
    /// Invariant violations found. Empty for a healthy ledger.
    pub problems: Vec<String>,
}

impl VerifyReport {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

impl Ledger {
    /// Opens the ledger stored in directory `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerLocked` if another handle has the directory open,
    /// and `CorruptLedgerFile` if the existing snapshot cannot be loaded.
    #[cfg(feature = "std")]
    pub fn open(path: &Path) -> LedgerResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens the ledger in directory `path` with custom configuration.
    ///
    /// ```rust,no_run
    /// use dagledger_core::{Config, Ledger, SnapshotFormat};
    /// use std::path::Path;
    ///
    /// let config = Config::default()
    ///     .create_if_missing(true)
    ///     .snapshot_format(SnapshotFormat::Json);
    /// let ledger = Ledger::open_with_config(Path::new("my_ledger"), config)?;
    /// # Ok::<(), dagledger_core::LedgerError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// See [`Ledger::open`]. Also returns `InvalidPath` if the directory is
    /// missing and `create_if_missing` is false.
    #[cfg(feature = "std")]
    pub fn open_with_config(path: &Path, config: Config) -> LedgerResult<Self> {
        use dagledger_storage::FileStore;

        let dir = LedgerDir::open(path, config.create_if_missing)?;
        let store = FileStore::open(&dir.snapshot_path())
            .map_err(|e| LedgerError::invalid_path(e.to_string()))?
            .with_sync(config.sync_on_write);
        let policy = Box::new(MinLengthPolicy::new(config.min_signature_len));

        let mut ledger = Self::open_with_parts(config, Box::new(store), policy)?;
        ledger._dir = Some(dir);
        Ok(ledger)
    }

    /// Opens an empty ledger that is never written to disk.
    ///
    /// # Errors
    ///
    /// Does not fail in practice; the signature matches the other
    /// constructors.
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::open_with_store(Config::default(), Box::new(InMemoryStore::new()))
    }

    /// Opens a ledger over an arbitrary snapshot store.
    ///
    /// # Errors
    ///
    /// Returns `CorruptLedgerFile` if the store holds an unloadable snapshot.
    pub fn open_with_store(config: Config, store: Box<dyn SnapshotStore>) -> LedgerResult<Self> {
        let policy = Box::new(MinLengthPolicy::new(config.min_signature_len));
        Self::open_with_parts(config, store, policy)
    }

    /// Opens a ledger with a custom store and signature policy.
    ///
    /// `config.min_signature_len` is ignored; `policy` decides alone.
    ///
    /// # Errors
    ///
    /// Returns `CorruptLedgerFile` if the store holds an unloadable snapshot
    /// or one that `policy` rejects.
    pub fn open_with_parts(
        config: Config,
        store: Box<dyn SnapshotStore>,
        policy: Box<dyn SignaturePolicy>,
    ) -> LedgerResult<Self> {
        let persistence = PersistenceManager::new(store, config.snapshot_format);
        let graph = persistence.load(policy.as_ref())?;

        info!(
            location = %persistence.location(),
            nodes = graph.len(),
            edges = graph.edge_count(),
            policy = %policy.describe(),
            "ledger opened"
        );

        Ok(Self {
            config,
            #[cfg(feature = "std")]
            _dir: None,
            inner: Mutex::new(Inner { graph, persistence }),
            policy,
            stats: LedgerStats::new(),
        })
    }

    /// Validates and admits a transaction, then rewrites the snapshot.
    ///
    /// # Errors
    ///
    /// - `MissingParent`, `DuplicateTransaction`, `InvalidPayload`,
    ///   `CycleDetected`, `InvalidSignature`: the ledger is unchanged.
    /// - `Persistence`: the transaction **is** admitted in memory but the
    ///   snapshot write failed. Call [`Ledger::persist`] to retry.
    pub fn submit(&self, tx: Transaction) -> LedgerResult<()> {
        self.stats.record_submission();
        let mut inner = self.inner.lock();

        if let Err(err) = inner.graph.admit(tx, self.policy.as_ref()) {
            warn!(error = %err, "transaction rejected");
            self.stats.record_rejection(&err);
            return Err(err);
        }
        self.stats.record_accepted();

        Self::write_snapshot(&mut inner, &self.stats)
    }

    /// Rewrites the snapshot from the current in-memory state.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the write fails.
    pub fn persist(&self) -> LedgerResult<()> {
        let mut inner = self.inner.lock();
        Self::write_snapshot(&mut inner, &self.stats)
    }

    fn write_snapshot(inner: &mut Inner, stats: &LedgerStats) -> LedgerResult<()> {
        let Inner { graph, persistence } = inner;
        match persistence.save(graph) {
            Ok(bytes) => {
                stats.record_snapshot_write(bytes);
                Ok(())
            }
            Err(err) => {
                warn!(
                    location = %persistence.location(),
                    error = %err,
                    "snapshot write failed, in-memory ledger is ahead of storage"
                );
                stats.record_snapshot_failure();
                Err(err)
            }
        }
    }

    /// Returns a copy of the transaction with this id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Transaction> {
        self.inner.lock().graph.get(id).cloned()
    }

    /// Whether a transaction with this id has been admitted.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().graph.contains(id)
    }

    /// Number of admitted transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().graph.len()
    }

    /// Whether the ledger holds no transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().graph.is_empty()
    }

    /// Number of parent-child edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.lock().graph.edge_count()
    }

    /// Direct parents of `id`. Empty for an unknown id.
    #[must_use]
    pub fn parents(&self, id: &str) -> Vec<String> {
        self.inner.lock().graph.parents(id)
    }

    /// Direct children of `id`. Empty for an unknown id.
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<String> {
        self.inner.lock().graph.children(id)
    }

    /// Every transaction `id` transitively depends on.
    #[must_use]
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        self.inner.lock().graph.ancestors(id)
    }

    /// Every transaction that transitively depends on `id`.
    #[must_use]
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        self.inner.lock().graph.descendants(id)
    }

    /// All ids, parents before children.
    #[must_use]
    pub fn topological_order(&self) -> Vec<String> {
        self.inner.lock().graph.topological_order()
    }

    /// Ids with no parents, in insertion order.
    #[must_use]
    pub fn roots(&self) -> Vec<String> {
        self.inner.lock().graph.roots()
    }

    /// Ids with no children, in insertion order.
    #[must_use]
    pub fn tips(&self) -> Vec<String> {
        self.inner.lock().graph.tips()
    }

    /// Content fingerprint of the transaction with this id.
    #[must_use]
    pub fn content_hash(&self, id: &str) -> Option<ContentHash> {
        self.inner.lock().graph.get(id).map(Transaction::content_hash)
    }

    /// All transactions in insertion order.
    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().graph.transactions().cloned().collect()
    }

    /// Re-checks every invariant over the live graph.
    #[must_use]
    pub fn verify(&self) -> VerifyReport {
        let inner = self.inner.lock();
        let graph = &inner.graph;
        let report = VerifyReport {
            nodes: graph.len(),
            edges: graph.edge_count(),
            roots: graph.roots().len(),
            tips: graph.tips().len(),
            problems: graph.check_invariants(self.policy.as_ref()),
        };
        if !report.is_ok() {
            warn!(problems = report.problems.len(), "ledger verification found problems");
        }
        report
    }

    /// Snapshot location, for diagnostics.
    #[must_use]
    pub fn location(&self) -> String {
        self.inner.lock().persistence.location()
    }

    /// The configuration the ledger was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("location", &self.location())
            .field("len", &self.len())
            .field("policy", &self.policy.describe())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotFormat;
    use dagledger_storage::{StorageError, StorageResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn tx(id: &str, parents: &[&str]) -> Transaction {
        Transaction::builder(id)
            .parents(parents.iter().copied())
            .payload_entry("amount", 10)
            .signature(format!("signature_valid_{id}"))
            .build()
    }

    fn diamond(ledger: &Ledger) {
        ledger.submit(tx("tx0", &[])).unwrap();
        ledger.submit(tx("tx1", &["tx0"])).unwrap();
        ledger.submit(tx("tx2", &["tx0"])).unwrap();
        ledger.submit(tx("tx3", &["tx1", "tx2"])).unwrap();
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    /// Store whose writes fail while `broken` is set.
    #[derive(Clone, Default)]
    struct SwitchableStore {
        inner: InMemoryStore,
        broken: Arc<AtomicBool>,
    }

    impl SnapshotStore for SwitchableStore {
        fn load(&self) -> StorageResult<Option<Vec<u8>>> {
            self.inner.load()
        }

        fn store(&mut self, data: &[u8]) -> StorageResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk unplugged".into()));
            }
            self.inner.store(data)
        }

        fn location(&self) -> String {
            "switchable".into()
        }
    }

    #[test]
    fn diamond_queries() {
        let ledger = Ledger::open_in_memory().unwrap();
        diamond(&ledger);

        assert_eq!(ledger.ancestors("tx3"), set(&["tx0", "tx1", "tx2"]));
        assert_eq!(ledger.descendants("tx0"), set(&["tx1", "tx2", "tx3"]));
        assert_eq!(ledger.parents("tx3"), ["tx1", "tx2"]);
        assert_eq!(ledger.children("tx0"), ["tx1", "tx2"]);
        assert_eq!(ledger.topological_order(), ["tx0", "tx1", "tx2", "tx3"]);
        assert_eq!(ledger.roots(), ["tx0"]);
        assert_eq!(ledger.tips(), ["tx3"]);
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.edge_count(), 4);
    }

    #[test]
    fn unknown_ids_query_empty() {
        let ledger = Ledger::open_in_memory().unwrap();
        diamond(&ledger);
        assert!(ledger.parents("nope").is_empty());
        assert!(ledger.children("nope").is_empty());
        assert!(ledger.ancestors("nope").is_empty());
        assert!(ledger.descendants("nope").is_empty());
        assert!(ledger.get("nope").is_none());
        assert!(ledger.content_hash("nope").is_none());
    }

    #[test]
    fn rejections_leave_ledger_unchanged() {
        let ledger = Ledger::open_in_memory().unwrap();
        diamond(&ledger);
        let before = ledger.transactions();

        let missing = ledger.submit(tx("tx5", &["tx4"])).unwrap_err();
        assert!(matches!(missing, LedgerError::MissingParent { ref parent, .. } if parent == "tx4"));

        let dup = ledger.submit(tx("tx1", &["tx0"])).unwrap_err();
        assert!(matches!(dup, LedgerError::DuplicateTransaction { ref id } if id == "tx1"));

        let short = Transaction::builder("tx4").parent("tx3").signature("short").build();
        assert!(matches!(
            ledger.submit(short),
            Err(LedgerError::InvalidSignature { .. })
        ));

        let unsigned = Transaction::builder("tx4").parent("tx3").build();
        assert!(matches!(
            ledger.submit(unsigned),
            Err(LedgerError::InvalidSignature { .. })
        ));

        assert_eq!(ledger.transactions(), before);
        assert_eq!(ledger.edge_count(), 4);
        assert!(ledger.verify().is_ok());

        let stats = ledger.stats();
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.rejected_missing_parent, 1);
        assert_eq!(stats.rejected_duplicate, 1);
        assert_eq!(stats.rejected_signature, 2);
    }

    #[test]
    fn self_reference_is_missing_parent() {
        let ledger = Ledger::open_in_memory().unwrap();
        let err = ledger.submit(tx("loop", &["loop"])).unwrap_err();
        match err {
            LedgerError::MissingParent { id, parent } => {
                assert_eq!(id, "loop");
                assert_eq!(parent, "loop");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.is_empty());
    }

    #[test]
    fn custom_policy_is_consulted() {
        struct PrefixPolicy;
        impl SignaturePolicy for PrefixPolicy {
            fn accepts(&self, tx: &Transaction) -> bool {
                tx.signature().is_some_and(|s| s.starts_with("ok:"))
            }
            fn describe(&self) -> String {
                "prefix(ok:)".into()
            }
        }

        let ledger = Ledger::open_with_parts(
            Config::default(),
            Box::new(InMemoryStore::new()),
            Box::new(PrefixPolicy),
        )
        .unwrap();
        ledger
            .submit(Transaction::builder("a").signature("ok:").build())
            .unwrap();
        assert!(ledger
            .submit(Transaction::builder("b").signature("signature_valid_long").build())
            .is_err());
    }

    #[test]
    fn persistence_failure_keeps_memory_state_and_retry_succeeds() {
        let store = SwitchableStore::default();
        let ledger = Ledger::open_with_store(Config::default(), Box::new(store.clone())).unwrap();
        ledger.submit(tx("tx0", &[])).unwrap();

        store.broken.store(true, Ordering::SeqCst);
        let err = ledger.submit(tx("tx1", &["tx0"])).unwrap_err();
        assert!(matches!(err, LedgerError::Persistence { .. }));
        assert!(!err.is_validation());
        assert!(ledger.contains("tx1"));
        assert_eq!(ledger.stats().snapshot_failures, 1);

        // storage still holds only tx0
        let stale = Ledger::open_with_store(Config::default(), Box::new(store.inner.clone())).unwrap();
        assert_eq!(stale.len(), 1);

        store.broken.store(false, Ordering::SeqCst);
        ledger.persist().unwrap();
        let fresh = Ledger::open_with_store(Config::default(), Box::new(store.inner.clone())).unwrap();
        assert_eq!(fresh.topological_order(), ["tx0", "tx1"]);
    }

    #[test]
    fn snapshot_rewritten_after_each_accept() {
        let store = InMemoryStore::new();
        let ledger = Ledger::open_with_store(Config::default(), Box::new(store.clone())).unwrap();
        diamond(&ledger);
        let _ = ledger.submit(tx("tx1", &["tx0"]));
        assert_eq!(store.write_count(), 4);
        assert_eq!(ledger.stats().snapshot_writes, 4);
    }

    #[test]
    fn reopen_from_directory() {
        let temp = tempdir().unwrap();
        let hash;
        {
            let ledger = Ledger::open(temp.path()).unwrap();
            diamond(&ledger);
            hash = ledger.content_hash("tx3").unwrap();
        }

        let reopened = Ledger::open(temp.path()).unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.edge_count(), 4);
        assert_eq!(reopened.content_hash("tx3"), Some(hash));
        assert_eq!(reopened.ancestors("tx3"), set(&["tx0", "tx1", "tx2"]));
        assert!(temp.path().join("LEDGER").exists());
        assert!(!temp.path().join("LEDGER.tmp").exists());
    }

    #[test]
    fn json_directory_ledger_reopens() {
        let temp = tempdir().unwrap();
        let config = Config::default().snapshot_format(SnapshotFormat::Json);
        {
            let ledger = Ledger::open_with_config(temp.path(), config.clone()).unwrap();
            diamond(&ledger);
        }
        let text = std::fs::read_to_string(temp.path().join("LEDGER")).unwrap();
        assert!(text.contains("\"transactions\""));

        let reopened = Ledger::open(temp.path()).unwrap();
        assert_eq!(reopened.topological_order(), ["tx0", "tx1", "tx2", "tx3"]);
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _first = Ledger::open(temp.path()).unwrap();
        assert!(matches!(
            Ledger::open(temp.path()),
            Err(LedgerError::LedgerLocked)
        ));
    }

    #[test]
    fn empty_snapshot_file_is_corrupt() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("LEDGER"), b"").unwrap();
        assert!(matches!(
            Ledger::open(temp.path()),
            Err(LedgerError::CorruptLedgerFile { .. })
        ));
    }

    #[test]
    fn concurrent_submits_are_serialized() {
        let ledger = Arc::new(Ledger::open_in_memory().unwrap());
        ledger.submit(tx("genesis", &[])).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    let mut prev = "genesis".to_string();
                    for i in 0..25 {
                        let id = format!("t{t}-{i}");
                        ledger.submit(tx(&id, &[prev.as_str()])).unwrap();
                        // a racing duplicate must always lose
                        assert!(ledger.submit(tx(&id, &["genesis"])).is_err());
                        prev = id;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ledger.len(), 1 + 8 * 25);
        assert_eq!(ledger.tips().len(), 8);
        assert!(ledger.verify().is_ok());
        assert_eq!(ledger.topological_order().len(), ledger.len());
    }
}
