//! Signature acceptance policies.
//!
//! The ledger does not verify signatures cryptographically. It asks a
//! [`SignaturePolicy`] whether a transaction's signature token is
//! acceptable; real verification plugs in behind the same trait.

use crate::config::DEFAULT_MIN_SIGNATURE_LEN;
use crate::transaction::Transaction;

/// Decides whether a transaction's signature is acceptable.
pub trait SignaturePolicy: Send + Sync {
    /// Returns true if the transaction may be admitted.
    fn accepts(&self, tx: &Transaction) -> bool;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Accepts any signature with at least `min_len` characters.
///
/// A missing or empty signature is always rejected, even with a
/// `min_len` of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinLengthPolicy {
    min_len: usize,
}

impl MinLengthPolicy {
    /// Creates a policy with the given minimum length.
    #[must_use]
    pub const fn new(min_len: usize) -> Self {
        Self { min_len }
    }

    /// The configured minimum.
    #[must_use]
    pub const fn min_len(&self) -> usize {
        self.min_len
    }
}

impl Default for MinLengthPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIGNATURE_LEN)
    }
}

impl SignaturePolicy for MinLengthPolicy {
    fn accepts(&self, tx: &Transaction) -> bool {
        match tx.signature() {
            Some(sig) if !sig.is_empty() => sig.chars().count() >= self.min_len,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        format!("min-length({})", self.min_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(sig: Option<&str>) -> Transaction {
        let builder = Transaction::builder("tx");
        match sig {
            Some(s) => builder.signature(s).build(),
            None => builder.build(),
        }
    }

    #[test]
    fn default_minimum_is_ten() {
        let policy = MinLengthPolicy::default();
        assert_eq!(policy.min_len(), 10);
        assert!(policy.accepts(&signed(Some("0123456789"))));
        assert!(!policy.accepts(&signed(Some("012345678"))));
    }

    #[test]
    fn missing_or_empty_is_rejected() {
        let lenient = MinLengthPolicy::new(0);
        assert!(!lenient.accepts(&signed(None)));
        assert!(!lenient.accepts(&signed(Some(""))));
        assert!(lenient.accepts(&signed(Some("x"))));
    }

    #[test]
    fn length_counts_characters() {
        let policy = MinLengthPolicy::new(4);
        // four characters, eight bytes
        assert!(policy.accepts(&signed(Some("éééé"))));
        assert!(!policy.accepts(&signed(Some("ééé"))));
    }

    #[test]
    fn describe_names_minimum() {
        assert_eq!(MinLengthPolicy::new(12).describe(), "min-length(12)");
    }
}
