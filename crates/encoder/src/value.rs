//! The native value model.
//!
//! This is what callers hand to `Schema::encode` and get back from
//! `Schema::decode`. It is a closed enum so that every decoded shape,
//! including the deferred-read big map, must be handled explicitly --
//! a big map never masquerades as an ordinary record.

use std::collections::BTreeMap;

use tzkit_micheline::Micheline;

use crate::bigint::BigInt;
use crate::bigmap::BigMapHandle;

/// A native value conforming to some type expression.
#[derive(Debug, Clone)]
pub enum Value {
    /// The `unit` singleton. Distinct from [`Value::None`].
    Unit,
    Bool(bool),
    /// `int`, `nat`, `mutez`. Arbitrary precision, never a host integer.
    Int(BigInt),
    /// `string` and the textual base58 leaves (`address`, `key`,
    /// `key_hash`, `signature`, `chain_id`, `contract`).
    String(String),
    Bytes(Vec<u8>),
    /// Canonical RFC-3339 text.
    Timestamp(String),
    /// `option` absence. Never produced for `unit`.
    None,
    Some(Box<Value>),
    /// Positional `or` branches.
    Left(Box<Value>),
    Right(Box<Value>),
    /// `list` and `set` contents (sets are canonically ordered on encode).
    List(Vec<Value>),
    /// `map` entries. Decode preserves wire order; iteration order
    /// carries no further meaning.
    Map(Vec<(Value, Value)>),
    /// Named `pair`/`or` access.
    Record(BTreeMap<String, Value>),
    /// An opaque instruction sequence, passed through unchanged.
    Lambda(Micheline),
    /// A lazy remote container; contents are fetched per key, never held.
    BigMap(BigMapHandle),
}

impl Value {
    /// Shorthand for a record value.
    pub fn record<I>(fields: I) -> Value
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    /// Shorthand for a string value.
    pub fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    /// Shorthand for an integer value.
    pub fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    /// A human-readable kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::None => "none",
            Value::Some(_) => "some",
            Value::Left(_) => "left",
            Value::Right(_) => "right",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Lambda(_) => "lambda",
            Value::BigMap(_) => "big_map",
        }
    }

    /// A record field by name, if this value is a record holding it.
    pub fn as_field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }

    /// The big-map handle, if this value is one.
    pub fn as_big_map(&self) -> Option<&BigMapHandle> {
        match self {
            Value::BigMap(handle) => Some(handle),
            _ => None,
        }
    }
}

// Big maps compare by on-chain id: re-decoding the same pointer yields a
// fresh handle, and the round-trip criterion there is identifier
// equality, not content equality.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Some(a), Value::Some(b)) => a == b,
            (Value::Left(a), Value::Left(b)) => a == b,
            (Value::Right(a), Value::Right(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => a == b,
            (Value::BigMap(a), Value::BigMap(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}
