//! Agreement values.

use crate::hash::{Hash, HexError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wire literal for the distinguished empty value.
pub const BOTTOM_LITERAL: &str = "_|_";

/// The value agreement is reached on: a block hash, or the distinguished
/// empty value `⊥` (distinct from every block hash).
///
/// `Bottom` orders before every block hash, and serializes as the literal
/// `_|_` wherever values travel as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// `⊥` — no value. May be a starting value, a vote target, or the
    /// committed outcome (in which case no block is appended).
    Bottom,
    /// The hash of a proposed block.
    Block(Hash),
}

impl Value {
    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom)
    }

    /// The block hash, unless this is `⊥`.
    pub fn block_hash(&self) -> Option<Hash> {
        match self {
            Value::Bottom => None,
            Value::Block(h) => Some(*h),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Bottom
    }
}

impl From<Hash> for Value {
    fn from(h: Hash) -> Self {
        Value::Block(h)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bottom => f.write_str(BOTTOM_LITERAL),
            Value::Block(h) => write!(f, "{h}"),
        }
    }
}

impl FromStr for Value {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == BOTTOM_LITERAL {
            Ok(Value::Bottom)
        } else {
            Ok(Value::Block(s.parse()?))
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_literal_round_trip() {
        assert_eq!(Value::Bottom.to_string(), "_|_");
        assert_eq!("_|_".parse::<Value>().unwrap(), Value::Bottom);
    }

    #[test]
    fn block_value_round_trip() {
        let v = Value::Block(Hash::of(b"block"));
        let parsed: Value = v.to_string().parse().unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn bottom_is_distinct_from_every_hash() {
        let v = Value::Block(Hash::ZERO);
        assert_ne!(Value::Bottom, v);
        assert!(Value::Bottom < v);
    }
}
