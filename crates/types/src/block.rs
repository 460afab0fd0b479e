//! Blocks, transactions and the in-memory chain.

use crate::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};

/// An opaque transaction payload. The agreement core never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Transaction {
            payload: payload.into(),
        }
    }

    /// Content hash, used to deduplicate the staging buffer.
    pub fn hash(&self) -> Hash {
        Hash::of(&self.payload)
    }
}

/// A content-addressed block: an ordered transaction list plus a
/// predecessor link. `hash()` is the value agreement is reached on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the predecessor block; [`Hash::ZERO`] for the genesis block.
    pub parent: Hash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(parent: Hash, transactions: Vec<Transaction>) -> Self {
        Block {
            parent,
            transactions,
        }
    }

    /// The stable content hash `H(b)`.
    pub fn hash(&self) -> Hash {
        let mut hasher = Hasher::new();
        hasher.update(self.parent.as_bytes());
        for tx in &self.transactions {
            hasher.update(&tx.payload);
        }
        hasher.finalize()
    }
}

/// The replicated ledger: one block per completed round.
pub type Blockchain = Vec<Block>;

/// Hash of the chain tip, or [`Hash::ZERO`] for an empty chain.
pub fn tip_hash(chain: &[Block]) -> Hash {
    chain.last().map(Block::hash).unwrap_or(Hash::ZERO)
}
