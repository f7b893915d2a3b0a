//! Structured keys and their canonical, cross-language-stable encoding.
//!
//! A [`Key`] is an unordered mapping from short field names to typed
//! scalar/document [`Value`]s. `canonical()` recursively sorts every
//! document's fields and serializes them with a stable, type-tagged binary
//! format, so that `canonical(k1) == canonical(k2)` iff `k1` and `k2` are
//! equal as documents (field order irrelevant).

use std::collections::BTreeMap;

use crate::error::{FileDbError, Result};

/// Reserved internal id field; may not appear in a user-supplied key.
pub const ID_FIELD: &str = "_id";

/// Reserved internal storage-path field; may not appear in a user-supplied
/// key. Kept identical to the original Python implementation's sentinel so
/// canonical encodings stay reproducible against recorded fixtures.
pub const STORAGE_PATH_FIELD: &str = "_storage_path_e5c8b4a5-96b1-4ed3-9a36-d8bb28204240";

/// A typed scalar or document value, as described by the key/query data
/// model. Variants line up with the BSON-style type tags the query DSL's
/// `has_type` predicate compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Regex(String),
    Array(Vec<Value>),
    Document(Key),
    ObjectId([u8; 12]),
    /// Canonical decimal form kept as a string to avoid float round-trip
    /// loss; comparisons are lexical-after-normalization, left to the
    /// Index adapter's native query engine.
    Decimal(String),
}

/// An unordered mapping from field name to [`Value`].
pub type Key = BTreeMap<String, Value>;

/// BSON-style type tag, used by the query DSL's `has_type` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Bool,
    Int32,
    Int64,
    Double,
    String,
    BinaryData,
    Date,
    RegularExpression,
    Array,
    Object,
    ObjectId,
    Decimal128,
}

impl Value {
    pub fn type_tag(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(v) => {
                if *v >= i32::MIN as i64 && *v <= i32::MAX as i64 {
                    ValueType::Int32
                } else {
                    ValueType::Int64
                }
            }
            Value::Float(_) => ValueType::Double,
            Value::Str(_) => ValueType::String,
            Value::Bytes(_) => ValueType::BinaryData,
            Value::Timestamp(_) => ValueType::Date,
            Value::Regex(_) => ValueType::RegularExpression,
            Value::Array(_) => ValueType::Array,
            Value::Document(_) => ValueType::Object,
            Value::ObjectId(_) => ValueType::ObjectId,
            Value::Decimal(_) => ValueType::Decimal128,
        }
    }
}

/// Reject reserved field names anywhere in a user-supplied key, recursively
/// through nested documents.
pub fn validate_key(key: &Key) -> Result<()> {
    for (field, value) in key {
        if field == ID_FIELD || field == STORAGE_PATH_FIELD {
            return Err(FileDbError::InvalidArgument(format!(
                "reserved field name '{}' may not appear in a key",
                field
            )));
        }
        if let Value::Document(nested) = value {
            validate_key(nested)?;
        }
    }
    Ok(())
}

// Type tags for the canonical binary encoding. Stable across releases;
// never reuse a tag for a different shape.
mod tag {
    pub const NULL: u8 = 0;
    pub const BOOL_FALSE: u8 = 1;
    pub const BOOL_TRUE: u8 = 2;
    pub const INT: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const STR: u8 = 5;
    pub const BYTES: u8 = 6;
    pub const TIMESTAMP: u8 = 7;
    pub const REGEX: u8 = 8;
    pub const ARRAY: u8 = 9;
    pub const DOCUMENT: u8 = 10;
    pub const OBJECT_ID: u8 = 11;
    pub const DECIMAL: u8 = 12;
}

fn encode_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(tag::NULL),
        Value::Bool(false) => buf.push(tag::BOOL_FALSE),
        Value::Bool(true) => buf.push(tag::BOOL_TRUE),
        Value::Int(v) => {
            buf.push(tag::INT);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float(v) => {
            buf.push(tag::FLOAT);
            // total_cmp-compatible bit ordering gives a stable byte
            // encoding without relying on text formatting.
            let bits = v.to_bits();
            let mapped = if bits & (1 << 63) != 0 {
                !bits
            } else {
                bits | (1 << 63)
            };
            buf.extend_from_slice(&mapped.to_be_bytes());
        }
        Value::Str(s) => {
            buf.push(tag::STR);
            encode_len_prefixed(buf, s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.push(tag::BYTES);
            encode_len_prefixed(buf, b);
        }
        Value::Timestamp(ms) => {
            buf.push(tag::TIMESTAMP);
            buf.extend_from_slice(&ms.to_be_bytes());
        }
        Value::Regex(pattern) => {
            buf.push(tag::REGEX);
            encode_len_prefixed(buf, pattern.as_bytes());
        }
        Value::Array(items) => {
            buf.push(tag::ARRAY);
            buf.extend_from_slice(&(items.len() as u64).to_be_bytes());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Document(doc) => {
            buf.push(tag::DOCUMENT);
            encode_document(buf, doc);
        }
        Value::ObjectId(id) => {
            buf.push(tag::OBJECT_ID);
            buf.extend_from_slice(id);
        }
        Value::Decimal(s) => {
            buf.push(tag::DECIMAL);
            encode_len_prefixed(buf, s.as_bytes());
        }
    }
}

fn encode_document(buf: &mut Vec<u8>, doc: &Key) {
    // `Key` is a `BTreeMap`, so iteration order is already the
    // field-name sort order required by the canonical form.
    buf.extend_from_slice(&(doc.len() as u64).to_be_bytes());
    for (field, value) in doc {
        encode_len_prefixed(buf, field.as_bytes());
        encode_value(buf, value);
    }
}

/// The canonical binary encoding of a key: its entries sorted by field
/// name, recursively, then serialized with a stable type-tagged format.
/// This is the Index's deduplication identity (`key_id(k1) == key_id(k2)`
/// iff `canonical(k1) == canonical(k2)`).
pub fn canonical(key: &Key) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_document(&mut buf, key);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(pairs: &[(&str, Value)]) -> Key {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn canonical_is_order_independent() {
        let k1 = key_of(&[("a", Value::Str("1".into())), ("b", Value::Int(2))]);
        let k2 = key_of(&[("b", Value::Int(2)), ("a", Value::Str("1".into()))]);
        assert_eq!(canonical(&k1), canonical(&k2));
    }

    #[test]
    fn canonical_distinguishes_values() {
        let k1 = key_of(&[("a", Value::Str("1".into()))]);
        let k2 = key_of(&[("a", Value::Str("2".into()))]);
        assert_ne!(canonical(&k1), canonical(&k2));
    }

    #[test]
    fn canonical_recurses_into_nested_documents() {
        let inner1 = key_of(&[("x", Value::Int(1)), ("y", Value::Int(2))]);
        let inner2 = key_of(&[("y", Value::Int(2)), ("x", Value::Int(1))]);
        let k1 = key_of(&[("nested", Value::Document(inner1))]);
        let k2 = key_of(&[("nested", Value::Document(inner2))]);
        assert_eq!(canonical(&k1), canonical(&k2));
    }

    #[test]
    fn validate_key_rejects_reserved_fields() {
        let k = key_of(&[(ID_FIELD, Value::Int(1))]);
        assert!(validate_key(&k).is_err());

        let k = key_of(&[(STORAGE_PATH_FIELD, Value::Int(1))]);
        assert!(validate_key(&k).is_err());

        let k = key_of(&[("a", Value::Int(1))]);
        assert!(validate_key(&k).is_ok());
    }

    #[test]
    fn validate_key_recurses() {
        let nested = key_of(&[(ID_FIELD, Value::Int(1))]);
        let k = key_of(&[("outer", Value::Document(nested))]);
        assert!(validate_key(&k).is_err());
    }
}
