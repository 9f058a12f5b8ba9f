//! Snapshot encoding.
//!
//! A snapshot is the full ordered list of admitted transactions. Two
//! encodings exist and reads detect which one they are given.
//!
//! Binary (CBOR) layout:
//!
//! ```text
//! +-------+---------+----------+----------------------+-----------+
//! | magic | version | body_len | body                 | checksum  |
//! | DAGL  | u16 LE  | u64 LE   | canonical CBOR array | SHA-256   |
//! | 4     | 2       | 8        | body_len             | 32        |
//! +-------+---------+----------+----------------------+-----------+
//! ```
//!
//! JSON layout: `{"format_version": 1, "transactions": [ ... ]}` with each
//! transaction as `{id, parent_ids, payload, signature, timestamp}`.

use crate::transaction::Transaction;
use dagledger_codec::{from_cbor, to_canonical_cbor, CodecError, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use thiserror::Error;

/// Magic bytes opening a binary snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"DAGL";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 8;
const CHECKSUM_LEN: usize = 32;

/// How snapshots are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Checksummed canonical CBOR.
    #[default]
    Cbor,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Serialize)]
struct JsonSnapshotRef<'a> {
    format_version: u16,
    transactions: Vec<&'a Transaction>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonSnapshot {
    format_version: u16,
    transactions: Vec<Transaction>,
}

/// Encodes transactions, in the given order, as a snapshot.
///
/// # Errors
///
/// JSON encoding errors are reported as I/O errors; CBOR encoding
/// cannot fail.
pub fn encode<'a, I>(transactions: I, format: SnapshotFormat) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    match format {
        SnapshotFormat::Cbor => Ok(encode_cbor(transactions)),
        SnapshotFormat::Json => {
            let doc = JsonSnapshotRef {
                format_version: SNAPSHOT_VERSION,
                transactions: transactions.into_iter().collect(),
            };
            Ok(serde_json::to_vec_pretty(&doc)?)
        }
    }
}

fn encode_cbor<'a, I>(transactions: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let body = to_canonical_cbor(&Value::Array(
        transactions.into_iter().map(Transaction::to_value).collect(),
    ));

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len() + CHECKSUM_LEN);
    buf.extend_from_slice(&SNAPSHOT_MAGIC);
    buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
    buf.extend_from_slice(&body);
    buf.extend_from_slice(&Sha256::digest(&body));
    buf
}

/// Detects the format of `data`.
///
/// Returns `None` if it is neither a binary nor a JSON snapshot.
#[must_use]
pub fn detect_format(data: &[u8]) -> Option<SnapshotFormat> {
    if data.starts_with(&SNAPSHOT_MAGIC) {
        return Some(SnapshotFormat::Cbor);
    }
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Some(SnapshotFormat::Json),
        _ => None,
    }
}

/// Why a snapshot could not be decoded.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Zero-length file.
    #[error("snapshot file is empty")]
    Empty,

    /// Neither the binary magic nor a JSON object.
    #[error("unrecognized snapshot format")]
    UnrecognizedFormat,

    /// Too short to hold the binary header and checksum.
    #[error("snapshot truncated at {len} bytes")]
    Truncated {
        /// Bytes actually present.
        len: usize,
    },

    /// Version zero or newer than this build understands.
    #[error("unsupported snapshot version {version}")]
    UnsupportedVersion {
        /// Version found in the file.
        version: u16,
    },

    /// The header's body length disagrees with the file size.
    #[error("snapshot length mismatch: header claims {claimed} body bytes, file has {actual}")]
    LengthMismatch {
        /// Body length recorded in the header.
        claimed: u64,
        /// Total file size.
        actual: usize,
    },

    /// The body does not hash to the stored checksum.
    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    /// The body is not valid canonical CBOR.
    #[error("snapshot body: {0}")]
    Body(#[source] CodecError),

    /// The body decoded to something other than an array.
    #[error("snapshot body must be an array, found {found}")]
    NotAnArray {
        /// Kind of value found instead.
        found: &'static str,
    },

    /// A binary record is not a well-formed transaction.
    #[error("record {index}: {source}")]
    Record {
        /// Position in file order.
        index: usize,
        /// The mapping failure.
        source: CodecError,
    },

    /// The JSON document is malformed.
    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a snapshot in either format.
///
/// The returned transactions are in file order. No graph invariants are
/// checked here; that happens during replay.
///
/// # Errors
///
/// Returns the first problem found.
pub fn decode(data: &[u8]) -> Result<Vec<Transaction>, SnapshotError> {
    if data.is_empty() {
        return Err(SnapshotError::Empty);
    }
    match detect_format(data) {
        Some(SnapshotFormat::Cbor) => decode_cbor(data),
        Some(SnapshotFormat::Json) => decode_json(data),
        None => Err(SnapshotError::UnrecognizedFormat),
    }
}

fn check_version(version: u16) -> Result<(), SnapshotError> {
    if version == 0 || version > SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { version });
    }
    Ok(())
}

fn decode_cbor(data: &[u8]) -> Result<Vec<Transaction>, SnapshotError> {
    if data.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(SnapshotError::Truncated { len: data.len() });
    }

    check_version(u16::from_le_bytes([data[4], data[5]]))?;

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[6..HEADER_LEN]);
    let body_len = u64::from_le_bytes(len_bytes);
    let expected_total = usize::try_from(body_len)
        .ok()
        .and_then(|n| n.checked_add(HEADER_LEN + CHECKSUM_LEN));
    if expected_total != Some(data.len()) {
        return Err(SnapshotError::LengthMismatch {
            claimed: body_len,
            actual: data.len(),
        });
    }

    let body_end = data.len() - CHECKSUM_LEN;
    let body = &data[HEADER_LEN..body_end];
    let actual = Sha256::digest(body);
    if actual.as_slice() != &data[body_end..] {
        return Err(SnapshotError::ChecksumMismatch);
    }

    let value = from_cbor(body).map_err(SnapshotError::Body)?;
    let records = value
        .as_array()
        .ok_or(SnapshotError::NotAnArray { found: value.kind() })?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            Transaction::from_value(record).map_err(|source| SnapshotError::Record { index, source })
        })
        .collect()
}

fn decode_json(data: &[u8]) -> Result<Vec<Transaction>, SnapshotError> {
    let doc: JsonSnapshot = serde_json::from_slice(data)?;
    check_version(doc.format_version)?;
    Ok(doc.transactions)
}
