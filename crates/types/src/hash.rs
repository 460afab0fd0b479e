//! Content hashing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a hex-encoded hash.
#[derive(Debug, Error)]
pub enum HexError {
    #[error("Invalid hex length: expected 64 characters, got {0}")]
    InvalidLength(usize),
    #[error("Invalid hex character at position {0}")]
    InvalidCharacter(usize),
}

/// A 32-byte blake3 digest.
///
/// Used for block hashes, credential hashes and signed-message digests.
/// Displays and serializes as lowercase hex so wire payloads and logs stay
/// human-comparable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero hash. Used as the predecessor link of the genesis block.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Hash(*blake3::hash(bytes).as_bytes())
    }

    /// Build a hash from raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

/// Incremental hasher over length-prefixed parts.
///
/// Prefixing each part with its length keeps distinct part sequences from
/// colliding after concatenation.
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Hasher(blake3::Hasher::new())
    }

    pub fn update(&mut self, part: &[u8]) -> &mut Self {
        self.0.update(&(part.len() as u64).to_le_bytes());
        self.0.update(part);
        self
    }

    pub fn finalize(&self) -> Hash {
        Hash(*self.0.finalize().as_bytes())
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs; full digest is rarely useful at a glance.
        write!(f, "Hash({}..)", &self.to_hex()[..8])
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(HexError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or(HexError::InvalidCharacter(i * 2))?;
            let lo = hex_val(chunk[1]).ok_or(HexError::InvalidCharacter(i * 2 + 1))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Hash(bytes))
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = Hash::of(b"sortis");
        let parsed: Hash = h.to_hex().parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            "abc".parse::<Hash>(),
            Err(HexError::InvalidLength(3))
        ));
        let mut s = Hash::ZERO.to_hex();
        s.replace_range(0..1, "z");
        assert!(matches!(
            s.parse::<Hash>(),
            Err(HexError::InvalidCharacter(0))
        ));
    }

    #[test]
    fn hasher_is_length_prefixed() {
        let a = {
            let mut h = Hasher::new();
            h.update(b"ab").update(b"c");
            h.finalize()
        };
        let b = {
            let mut h = Hasher::new();
            h.update(b"a").update(b"bc");
            h.finalize()
        };
        assert_ne!(a, b);
    }
}
