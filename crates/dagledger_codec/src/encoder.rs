//! Canonical CBOR encoder.

use crate::value::Value;
use std::cmp::Ordering;

/// Canonical encoding of NaN (half-precision quiet NaN).
pub(crate) const CANONICAL_NAN: [u8; 3] = [0xf9, 0x7e, 0x00];

/// Encode a value to canonical CBOR bytes.
///
/// Output is deterministic:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers and lengths use the shortest possible encoding
/// - Floats are always 64-bit doubles, except NaN which uses `f9 7e00`
/// - No indefinite-length items
///
/// Every [`Value`] has an encoding, so this cannot fail.
pub fn to_canonical_cbor(value: &Value) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// Ordering of text map keys under canonical CBOR.
///
/// The encoded header grows with the string length, so comparing encoded
/// keys reduces to comparing UTF-8 length first, then bytes.
pub fn cmp_text_keys(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
        ord => ord,
    }
}

/// A canonical CBOR encoder writing into an owned buffer.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append the encoding of `value`.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f),
            Value::Text(s) => self.encode_text(s),
            Value::Array(items) => {
                self.encode_header(4, items.len() as u64);
                for item in items {
                    self.encode(item);
                }
            }
            Value::Map(entries) => {
                let mut sorted: Vec<(&String, &Value)> = entries.iter().collect();
                sorted.sort_by(|a, b| cmp_text_keys(a.0, b.0));

                self.encode_header(5, entries.len() as u64);
                for (key, value) in sorted {
                    self.encode_text(key);
                    self.encode(value);
                }
            }
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_header(0, n as u64);
        } else {
            // CBOR negative integers carry -(n+1)
            self.encode_header(1, (-(n + 1)) as u64);
        }
    }

    fn encode_float(&mut self, f: f64) {
        if f.is_nan() {
            self.buffer.extend_from_slice(&CANONICAL_NAN);
        } else {
            self.buffer.push(0xfb);
            self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_header(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_header(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}
