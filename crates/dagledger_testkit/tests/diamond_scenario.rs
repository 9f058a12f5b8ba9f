//! End-to-end behavior of the four-transaction diamond.

use dagledger_core::{LedgerError, Transaction};
use dagledger_testkit::prelude::*;
use std::collections::BTreeSet;

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn closures_and_order() {
    init_test_logging();
    let ledger = scenarios::diamond_ledger();

    assert_eq!(ledger.ancestors("tx3"), set(&["tx0", "tx1", "tx2"]));
    assert_eq!(ledger.descendants("tx0"), set(&["tx1", "tx2", "tx3"]));
    assert_eq!(ledger.parents("tx3"), ["tx1", "tx2"]);
    assert_eq!(ledger.children("tx0"), ["tx1", "tx2"]);

    let order = ledger.topological_order();
    let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
    assert!(pos("tx0") < pos("tx1"));
    assert!(pos("tx0") < pos("tx2"));
    assert!(pos("tx1") < pos("tx3"));
    assert!(pos("tx2") < pos("tx3"));
}

#[test]
fn unknown_parent_rejected_without_change() {
    let ledger = scenarios::diamond_ledger();
    let before = ledger.transactions();

    let err = ledger.submit(signed("tx5", &["tx4"])).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::MissingParent { ref id, ref parent } if id == "tx5" && parent == "tx4"
    ));
    assert_eq!(ledger.transactions(), before);
    assert!(ledger.children("tx3").is_empty());
}

#[test]
fn duplicate_rejected_and_original_kept() {
    let ledger = scenarios::diamond_ledger();
    let original_hash = ledger.content_hash("tx1").unwrap();

    let replacement = Transaction::builder("tx1")
        .parent("tx0")
        .payload_entry("amount", 999)
        .signature(VALID_SIGNATURE)
        .build();
    let err = ledger.submit(replacement).unwrap_err();

    assert!(matches!(err, LedgerError::DuplicateTransaction { ref id } if id == "tx1"));
    assert_eq!(ledger.content_hash("tx1"), Some(original_hash));
    assert_eq!(ledger.len(), 4);
}

#[test]
fn unsigned_and_short_signatures_rejected() {
    let ledger = scenarios::diamond_ledger();

    let err = ledger.submit(unsigned("tx4", &["tx3"])).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidSignature { ref id } if id == "tx4"));

    let short = Transaction::builder("tx4")
        .parent("tx3")
        .signature("123456789")
        .build();
    assert!(matches!(
        ledger.submit(short),
        Err(LedgerError::InvalidSignature { .. })
    ));

    // exactly ten characters is enough
    let ten = Transaction::builder("tx4")
        .parent("tx3")
        .signature("0123456789")
        .build();
    ledger.submit(ten).unwrap();
    assert_eq!(ledger.tips(), ["tx4"]);
}

#[test]
fn self_reference_reports_own_id_as_missing_parent() {
    let ledger = scenarios::diamond_ledger();
    let err = ledger.submit(signed("tx4", &["tx4"])).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::MissingParent { ref id, ref parent } if id == "tx4" && parent == "tx4"
    ));
    assert!(ledger.verify().is_ok());
}

#[test]
fn verify_report_counts() {
    let ledger = scenarios::diamond_ledger();
    let report = ledger.verify();
    assert!(report.is_ok());
    assert_eq!(report.nodes, 4);
    assert_eq!(report.edges, 4);
    assert_eq!(report.roots, 1);
    assert_eq!(report.tips, 1);
}
