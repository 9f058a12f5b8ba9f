//! The transaction record and its canonical hash.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use dagledger_codec::{to_canonical_cbor, CodecError, CodecResult, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Opaque application data attached to a transaction.
pub type Payload = BTreeMap<String, Value>;

/// Deepest payload nesting the ledger accepts.
///
/// The payload map itself counts as one level; every nested array or map
/// adds one. Snapshot framing adds a few levels on top, and the result
/// must stay under the decoders' recursion limits or the ledger could
/// not be reloaded.
pub const MAX_PAYLOAD_DEPTH: usize = 64;

/// Why a payload cannot be stored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    /// A NaN or infinite float, which JSON snapshots cannot represent.
    #[error("payload entry {key:?} contains a non-finite float")]
    NonFiniteFloat {
        /// Top-level payload key holding the offending value.
        key: String,
    },

    /// Nesting beyond [`MAX_PAYLOAD_DEPTH`].
    #[error("payload nesting depth {depth} exceeds the limit of {max}")]
    TooDeep {
        /// Measured depth, counting the payload map as one.
        depth: usize,
        /// The configured limit.
        max: usize,
    },
}

/// Field names of the canonical record, shared by every encoding.
const FIELD_ID: &str = "id";
const FIELD_PARENT_IDS: &str = "parent_ids";
const FIELD_PAYLOAD: &str = "payload";
const FIELD_SIGNATURE: &str = "signature";
const FIELD_TIMESTAMP: &str = "timestamp";

/// An immutable ledger entry.
///
/// A transaction names the transactions it depends on through
/// `parent_ids`; the ledger turns those references into graph edges.
/// Fields are fixed at construction and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    id: String,
    #[serde(default)]
    parent_ids: Vec<String>,
    #[serde(default)]
    payload: Payload,
    #[serde(default)]
    signature: Option<String>,
    timestamp: String,
}

impl Transaction {
    /// Creates a transaction.
    ///
    /// When `timestamp` is `None` the current UTC time is used, formatted
    /// as RFC 3339 with microsecond precision.
    pub fn new<P, S>(
        id: impl Into<String>,
        parent_ids: P,
        payload: Payload,
        signature: Option<String>,
        timestamp: Option<String>,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            parent_ids: parent_ids.into_iter().map(Into::into).collect(),
            payload,
            signature,
            timestamp: timestamp.unwrap_or_else(now_timestamp),
        }
    }

    /// Starts building a transaction with the given id.
    pub fn builder(id: impl Into<String>) -> TransactionBuilder {
        TransactionBuilder::new(id)
    }

    /// The transaction id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Referenced parents, in the order given at construction.
    #[must_use]
    pub fn parent_ids(&self) -> &[String] {
        &self.parent_ids
    }

    /// Whether this transaction has no parents.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_ids.is_empty()
    }

    /// The application payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The signature token, if any.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// The timestamp string as stored.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Parses the timestamp.
    ///
    /// Accepts RFC 3339 and offset-less ISO-8601 (read as UTC).
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// The record as a codec value: a map of the five fields.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut record = BTreeMap::new();
        record.insert(FIELD_ID.to_string(), Value::Text(self.id.clone()));
        record.insert(
            FIELD_PARENT_IDS.to_string(),
            Value::Array(self.parent_ids.iter().cloned().map(Value::Text).collect()),
        );
        record.insert(FIELD_PAYLOAD.to_string(), Value::Map(self.payload.clone()));
        record.insert(
            FIELD_SIGNATURE.to_string(),
            self.signature.clone().map_or(Value::Null, Value::Text),
        );
        record.insert(
            FIELD_TIMESTAMP.to_string(),
            Value::Text(self.timestamp.clone()),
        );
        Value::Map(record)
    }

    /// Rebuilds a transaction from [`Transaction::to_value`] output.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStructure` if the value is not a map of exactly the
    /// five record fields with the expected types.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let record = value
            .as_map()
            .ok_or_else(|| CodecError::invalid_structure(format!(
                "transaction record must be a map, found {}",
                value.kind()
            )))?;

        if let Some(unknown) = record.keys().find(|k| {
            ![FIELD_ID, FIELD_PARENT_IDS, FIELD_PAYLOAD, FIELD_SIGNATURE, FIELD_TIMESTAMP]
                .contains(&k.as_str())
        }) {
            return Err(CodecError::invalid_structure(format!(
                "unknown transaction field {unknown:?}"
            )));
        }

        let field = |name: &str| {
            record
                .get(name)
                .ok_or_else(|| CodecError::invalid_structure(format!("missing field {name:?}")))
        };
        let text = |name: &str| -> CodecResult<String> {
            field(name)?.as_text().map(str::to_string).ok_or_else(|| {
                CodecError::invalid_structure(format!("field {name:?} must be text"))
            })
        };

        let parent_ids = field(FIELD_PARENT_IDS)?
            .as_array()
            .ok_or_else(|| CodecError::invalid_structure("field \"parent_ids\" must be an array"))?
            .iter()
            .map(|p| {
                p.as_text().map(str::to_string).ok_or_else(|| {
                    CodecError::invalid_structure("parent ids must be text")
                })
            })
            .collect::<CodecResult<Vec<_>>>()?;

        let payload = field(FIELD_PAYLOAD)?
            .as_map()
            .cloned()
            .ok_or_else(|| CodecError::invalid_structure("field \"payload\" must be a map"))?;

        let signature = match field(FIELD_SIGNATURE)? {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            other => {
                return Err(CodecError::invalid_structure(format!(
                    "field \"signature\" must be text or null, found {}",
                    other.kind()
                )))
            }
        };

        Ok(Self {
            id: text(FIELD_ID)?,
            parent_ids,
            payload,
            signature,
            timestamp: text(FIELD_TIMESTAMP)?,
        })
    }

    /// Deterministic serialization of all five fields.
    ///
    /// Fields and payload keys appear in canonical sorted order, so two
    /// transactions with equal field values always produce equal bytes.
    #[must_use]
    pub fn canonical_form(&self) -> Vec<u8> {
        to_canonical_cbor(&self.to_value())
    }

    /// SHA-256 of [`Transaction::canonical_form`].
    ///
    /// This is an integrity fingerprint; identity is governed by `id`.
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash(Sha256::digest(self.canonical_form()).into())
    }

    /// Checks that the payload survives every snapshot format unchanged.
    pub fn check_payload(&self) -> Result<(), PayloadError> {
        if let Some(key) = self.payload.iter().find_map(|(key, value)| {
            value.contains_non_finite().then(|| key.clone())
        }) {
            return Err(PayloadError::NonFiniteFloat { key });
        }
        let depth = 1 + self.payload.values().map(Value::depth).max().unwrap_or(0);
        if depth > MAX_PAYLOAD_DEPTH {
            return Err(PayloadError::TooDeep {
                depth,
                max: MAX_PAYLOAD_DEPTH,
            });
        }
        Ok(())
    }
}

/// Current UTC time as an RFC 3339 string.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Builder for [`Transaction`].
///
/// ```
/// use dagledger_core::Transaction;
///
/// let tx = Transaction::builder("tx1")
///     .parent("tx0")
///     .payload_entry("amount", 100)
///     .signature("signature_valid_abcdef")
///     .build();
/// assert_eq!(tx.parent_ids(), ["tx0".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    id: String,
    parent_ids: Vec<String>,
    payload: Payload,
    signature: Option<String>,
    timestamp: Option<String>,
}

impl TransactionBuilder {
    /// Creates a builder for a root transaction with no payload.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_ids: Vec::new(),
            payload: Payload::new(),
            signature: None,
            timestamp: None,
        }
    }

    /// Appends a parent reference.
    #[must_use]
    pub fn parent(mut self, id: impl Into<String>) -> Self {
        self.parent_ids.push(id.into());
        self
    }

    /// Appends several parent references.
    #[must_use]
    pub fn parents<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Replaces the whole payload.
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets one payload entry.
    #[must_use]
    pub fn payload_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Sets the signature token.
    #[must_use]
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Sets an explicit timestamp instead of the build time.
    #[must_use]
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Finishes the transaction.
    #[must_use]
    pub fn build(self) -> Transaction {
        Transaction::new(
            self.id,
            self.parent_ids,
            self.payload,
            self.signature,
            self.timestamp,
        )
    }
}

/// A SHA-256 content fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}
