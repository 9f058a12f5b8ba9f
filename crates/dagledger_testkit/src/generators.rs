//! Property-based test generators using proptest.
//!
//! Provides strategies for payloads, valid DAG histories and mixed
//! histories that interleave submissions the ledger must reject.

use crate::fixtures::{FIXED_TIMESTAMP, VALID_SIGNATURE};
use dagledger_core::{Payload, Transaction, Value, MAX_PAYLOAD_DEPTH};
use proptest::prelude::*;
use proptest::sample::Index;

/// Strategy for payload leaf values.
///
/// Floats are finite so generated payloads compare equal to themselves.
pub fn leaf_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12f64).prop_map(Value::Float),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for arbitrary (nested) payload values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Wraps `leaf` in `levels` single-element arrays.
pub fn nested_value(levels: usize, leaf: Value) -> Value {
    (0..levels).fold(leaf, |inner, _| Value::Array(vec![inner]))
}

/// Strategy for NaN and the two infinities.
pub fn non_finite_float_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(f64::NAN), Just(f64::INFINITY), Just(f64::NEG_INFINITY)]
}

/// Strategy for payloads the ledger must refuse to store.
///
/// Either a non-finite float hidden somewhere in an otherwise valid
/// entry, or a chain of arrays just past the nesting limit.
pub fn unstorable_payload_strategy() -> impl Strategy<Value = Payload> {
    let non_finite = (payload_strategy(), non_finite_float_strategy(), 0usize..4).prop_map(
        |(mut payload, bad, levels)| {
            payload.insert("bad".into(), nested_value(levels, Value::Float(bad)));
            payload
        },
    );
    let too_deep = (payload_strategy(), 0usize..8, leaf_value_strategy()).prop_map(
        |(mut payload, extra, leaf)| {
            payload.insert("deep".into(), nested_value(MAX_PAYLOAD_DEPTH + extra, leaf));
            payload
        },
    );
    prop_oneof![non_finite, too_deep]
}

/// Strategy for transaction payloads.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map("[a-z_]{1,8}", value_strategy(), 0..5)
}

/// Strategy for signatures the default policy accepts.
pub fn valid_signature_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{10,40}"
}

/// Strategy for signatures the default policy rejects.
pub fn invalid_signature_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[a-z0-9]{0,9}".prop_map(Some)]
}

fn id_for(i: usize) -> String {
    format!("tx{i}")
}

/// Strategy for a valid submission history of up to `max_len` transactions.
///
/// Transaction `i` has id `tx{i}` and up to three parents drawn from the
/// transactions before it, so submitting in order never fails.
pub fn dag_history_strategy(max_len: usize) -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec(
        (
            prop::collection::vec(any::<Index>(), 0..4),
            payload_strategy(),
            valid_signature_strategy(),
        ),
        1..=max_len.max(1),
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (picks, payload, signature))| {
                let parents: Vec<String> = if i == 0 {
                    Vec::new()
                } else {
                    picks.iter().map(|ix| id_for(ix.index(i))).collect()
                };
                Transaction::new(
                    id_for(i),
                    parents,
                    payload,
                    Some(signature),
                    Some(FIXED_TIMESTAMP.to_string()),
                )
            })
            .collect()
    })
}

/// Why an [`Attempt`] is expected to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Names a parent that was never admitted.
    MissingParent,
    /// Reuses an admitted id.
    Duplicate,
    /// Carries a missing or too-short signature.
    InvalidSignature,
    /// Carries a payload no snapshot format can store faithfully.
    InvalidPayload,
}

/// One submission in a mixed history.
#[derive(Debug, Clone)]
pub enum Attempt {
    /// Must be accepted.
    Valid(Transaction),
    /// Must be rejected for the given reason.
    Invalid {
        /// The transaction to submit.
        tx: Transaction,
        /// Expected failure.
        expected: Rejection,
    },
}

impl Attempt {
    /// The transaction to submit.
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Valid(tx) | Self::Invalid { tx, .. } => tx,
        }
    }
}

/// Strategy for histories mixing valid and invalid submissions.
///
/// Three in seven attempts are valid. Invalid ones are constructed
/// so exactly one check fails: the first in check order.
pub fn mixed_history_strategy(max_len: usize) -> impl Strategy<Value = Vec<Attempt>> {
    prop::collection::vec(
        (
            0u8..7,
            prop::collection::vec(any::<Index>(), 0..3),
            any::<Index>(),
            invalid_signature_strategy(),
            unstorable_payload_strategy(),
        ),
        1..=max_len.max(1),
    )
    .prop_map(|specs| {
        let mut admitted: Vec<String> = Vec::new();
        let mut attempts = Vec::with_capacity(specs.len());

        for (step, (kind, picks, dup_pick, bad_sig, bad_payload)) in specs.into_iter().enumerate() {
            let parents: Vec<String> = if admitted.is_empty() {
                Vec::new()
            } else {
                picks.iter().map(|ix| ix.get(&admitted).clone()).collect()
            };
            let fresh_id = format!("n{step}");

            let attempt = match kind {
                3 => {
                    let mut with_ghost = parents.clone();
                    with_ghost.push(format!("ghost{step}"));
                    invalid(&fresh_id, with_ghost, Some(VALID_SIGNATURE.into()), Rejection::MissingParent)
                }
                4 if !admitted.is_empty() => {
                    let id = dup_pick.get(&admitted).clone();
                    invalid(&id, parents, Some(VALID_SIGNATURE.into()), Rejection::Duplicate)
                }
                5 => invalid(&fresh_id, parents, bad_sig, Rejection::InvalidSignature),
                6 => Attempt::Invalid {
                    tx: Transaction::new(
                        fresh_id,
                        parents,
                        bad_payload,
                        Some(VALID_SIGNATURE.to_string()),
                        Some(FIXED_TIMESTAMP.to_string()),
                    ),
                    expected: Rejection::InvalidPayload,
                },
                _ => {
                    admitted.push(fresh_id.clone());
                    Attempt::Valid(Transaction::new(
                        fresh_id,
                        parents,
                        Payload::new(),
                        Some(VALID_SIGNATURE.to_string()),
                        Some(FIXED_TIMESTAMP.to_string()),
                    ))
                }
            };
            attempts.push(attempt);
        }
        attempts
    })
}

fn invalid(id: &str, parents: Vec<String>, signature: Option<String>, expected: Rejection) -> Attempt {
    Attempt::Invalid {
        tx: Transaction::new(id, parents, Payload::new(), signature, Some(FIXED_TIMESTAMP.to_string())),
        expected,
    }
}
