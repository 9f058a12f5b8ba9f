//! # dagledger Codec
//!
//! Payload values and deterministic CBOR encoding for dagledger.
//!
//! Transaction hashing needs a serialization in which identical field
//! values always produce identical bytes. This crate provides it:
//!
//! - Maps are keyed by text and sorted canonically (length-first, bytewise)
//! - Integers and lengths use the shortest encoding
//! - Floats are 64-bit doubles; NaN has a single encoding
//! - No indefinite-length items, tags, or byte strings
//!
//! The decoder is strict: it rejects any input the encoder would not
//! have produced.
//!
//! ## Usage
//!
//! ```
//! use dagledger_codec::{from_cbor, to_canonical_cbor, Value};
//!
//! let value = Value::map([("amount", Value::Integer(100))]);
//! let bytes = to_canonical_cbor(&value);
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder, MAX_DEPTH};
pub use encoder::{cmp_text_keys, to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;
