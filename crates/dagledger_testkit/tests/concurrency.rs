//! Racing submitters against one ledger.

use dagledger_core::Ledger;
use dagledger_testkit::prelude::*;
use std::sync::Arc;
use std::thread;

#[test]
fn interleaved_chains_stay_consistent() {
    let ledger = Arc::new(Ledger::open_in_memory().unwrap());
    let config = StressConfig::default();
    let result = concurrent_chains(Arc::clone(&ledger), &config);

    let expected = 1 + config.threads * config.per_thread;
    assert_eq!(result.successful_ops, expected);
    assert_eq!(result.failed_ops, config.threads * config.per_thread);
    assert_eq!(ledger.len(), expected);
    assert_eq!(ledger.topological_order().len(), expected);
    assert!(ledger.verify().is_ok());
}

#[test]
fn same_id_from_many_threads_admits_exactly_once() {
    let ledger = Arc::new(Ledger::open_in_memory().unwrap());
    ledger.submit(signed("root", &[])).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.submit(signed("contested", &["root"])).is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.stats().rejected_duplicate, 15);
}

#[test]
fn readers_never_see_partial_admission() {
    let ledger = Arc::new(Ledger::open_in_memory().unwrap());
    ledger.submit(signed("root", &[])).unwrap();

    let writer = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || {
            let ids = (0..200).map(|i| format!("w{i}")).collect::<Vec<_>>();
            for (i, id) in ids.iter().enumerate() {
                let parent = if i == 0 { "root" } else { ids[i - 1].as_str() };
                ledger.submit(signed(id, &[parent])).unwrap();
            }
        })
    };

    let reader = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || {
            for _ in 0..200 {
                let report = ledger.verify();
                assert!(report.is_ok(), "{:?}", report.problems);
                assert_eq!(report.edges + 1, report.nodes);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(ledger.descendants("root").len(), 200);
}

#[test]
fn file_backed_ledger_under_contention() {
    let fixture = TestLedger::file();
    let ledger = Arc::new(fixture.ledger);
    let config = StressConfig {
        threads: 3,
        per_thread: 15,
        race_duplicates: false,
    };
    let result = concurrent_chains(Arc::clone(&ledger), &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(ledger.stats().snapshot_writes as usize, result.successful_ops);
}
