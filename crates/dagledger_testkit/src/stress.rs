//! Stress helpers for concurrent submission.
//!
//! These verify that racing submitters cannot break the graph
//! invariants or lose accepted transactions.

use crate::fixtures::signed;
use dagledger_core::Ledger;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Submissions attempted.
    pub total_ops: usize,
    /// Submissions accepted.
    pub successful_ops: usize,
    /// Submissions rejected.
    pub failed_ops: usize,
    /// Wall-clock duration.
    pub duration: Duration,
    /// Submissions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of submitting threads.
    pub threads: usize,
    /// Transactions each thread appends to its own chain.
    pub per_thread: usize,
    /// Whether each thread also races a duplicate after every submit.
    pub race_duplicates: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            per_thread: 50,
            race_duplicates: true,
        }
    }
}

/// Submits `genesis`, then has every thread grow its own chain from it.
///
/// Thread `t` also links each new transaction to the latest entry of
/// thread `t - 1` when one is visible, so chains interleave. Every
/// duplicate race must be rejected.
pub fn concurrent_chains(ledger: Arc<Ledger>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let ok = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    match ledger.submit(signed("genesis", &[])) {
        Ok(()) => ok.fetch_add(1, Ordering::Relaxed),
        Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
    };

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let ok = Arc::clone(&ok);
            let rejected = Arc::clone(&rejected);
            let per_thread = config.per_thread;
            let race = config.race_duplicates;

            thread::spawn(move || {
                let mut prev = "genesis".to_string();
                for i in 0..per_thread {
                    let id = format!("t{t}-{i}");
                    let neighbour = t
                        .checked_sub(1)
                        .map(|n| format!("t{n}-{i}"))
                        .filter(|n| ledger.contains(n));

                    let mut parents = vec![prev.as_str()];
                    if let Some(n) = neighbour.as_deref() {
                        parents.push(n);
                    }

                    match ledger.submit(signed(&id, &parents)) {
                        Ok(()) => ok.fetch_add(1, Ordering::Relaxed),
                        Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
                    };
                    if race {
                        match ledger.submit(signed(&id, &["genesis"])) {
                            Ok(()) => ok.fetch_add(1, Ordering::Relaxed),
                            Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                    prev = id;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("stress thread panicked");
    }

    StressTestResult::new(
        ok.load(Ordering::Relaxed),
        rejected.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_run_accounts_for_every_submission() {
        let ledger = Arc::new(Ledger::open_in_memory().unwrap());
        let config = StressConfig {
            threads: 3,
            per_thread: 10,
            race_duplicates: true,
        };
        let result = concurrent_chains(Arc::clone(&ledger), &config);

        assert_eq!(result.successful_ops, 1 + 3 * 10);
        assert_eq!(result.failed_ops, 3 * 10);
        assert_eq!(ledger.len(), result.successful_ops);
        assert!(ledger.verify().is_ok());
    }
}
