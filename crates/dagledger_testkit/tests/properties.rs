//! Randomized invariant checks over generated histories.

use dagledger_core::{Ledger, LedgerError};
use dagledger_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

fn edge_set(ledger: &Ledger) -> BTreeSet<(String, String)> {
    ledger
        .transactions()
        .iter()
        .flat_map(|tx| {
            let child = tx.id().to_string();
            ledger
                .parents(tx.id())
                .into_iter()
                .map(move |p| (p, child.clone()))
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn topological_order_respects_every_edge(history in dag_history_strategy(30)) {
        let ledger = Ledger::open_in_memory().unwrap();
        for tx in history {
            ledger.submit(tx).unwrap();
        }

        let order = ledger.topological_order();
        prop_assert_eq!(order.len(), ledger.len());
        let unique: BTreeSet<_> = order.iter().collect();
        prop_assert_eq!(unique.len(), order.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        for (parent, child) in edge_set(&ledger) {
            prop_assert!(position[parent.as_str()] < position[child.as_str()]);
        }
    }

    #[test]
    fn ancestors_and_descendants_are_mirror_images(history in dag_history_strategy(20)) {
        let ledger = Ledger::open_in_memory().unwrap();
        for tx in history {
            ledger.submit(tx).unwrap();
        }

        let ids: Vec<String> = ledger.topological_order();
        for a in &ids {
            let ancestors = ledger.ancestors(a);
            prop_assert!(!ancestors.contains(a));
            for b in &ancestors {
                prop_assert!(ledger.descendants(b).contains(a));
            }
        }
    }

    #[test]
    fn every_parent_id_resolves(history in dag_history_strategy(25)) {
        let ledger = Ledger::open_in_memory().unwrap();
        for tx in history {
            ledger.submit(tx).unwrap();
        }
        for tx in ledger.transactions() {
            for pid in tx.parent_ids() {
                prop_assert!(ledger.contains(pid));
                prop_assert!(ledger.children(pid).iter().any(|c| c == tx.id()));
            }
        }
    }

    #[test]
    fn rejections_never_change_state(attempts in mixed_history_strategy(40)) {
        let ledger = Ledger::open_in_memory().unwrap();

        for attempt in attempts {
            let before_len = ledger.len();
            let before_edges = edge_set(&ledger);
            let result = ledger.submit(attempt.transaction().clone());

            match attempt {
                Attempt::Valid(_) => prop_assert!(result.is_ok(), "{:?}", result),
                Attempt::Invalid { expected, .. } => {
                    let err = result.unwrap_err();
                    let matched = match expected {
                        Rejection::MissingParent => matches!(err, LedgerError::MissingParent { .. }),
                        Rejection::Duplicate => matches!(err, LedgerError::DuplicateTransaction { .. }),
                        Rejection::InvalidSignature => matches!(err, LedgerError::InvalidSignature { .. }),
                        Rejection::InvalidPayload => matches!(err, LedgerError::InvalidPayload { .. }),
                    };
                    prop_assert!(matched, "expected {:?}, got {}", expected, err);
                    prop_assert_eq!(ledger.len(), before_len);
                    prop_assert_eq!(edge_set(&ledger), before_edges);
                }
            }
        }

        prop_assert!(ledger.verify().is_ok());
        let stats = ledger.stats();
        prop_assert_eq!(stats.accepted as usize, ledger.len());
    }

    #[test]
    fn ids_stay_unique(history in dag_history_strategy(20)) {
        let ledger = Ledger::open_in_memory().unwrap();
        for tx in history.iter().cloned() {
            ledger.submit(tx).unwrap();
        }
        for tx in history {
            prop_assert!(ledger.submit(tx).is_err());
        }
        let ids: BTreeSet<String> = ledger.transactions().iter().map(|t| t.id().to_string()).collect();
        prop_assert_eq!(ids.len(), ledger.len());
    }
}
