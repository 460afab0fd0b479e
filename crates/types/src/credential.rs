//! Credential and signature placeholders.
//!
//! `SIG` and `sign_message` stand in for a VRF or signature scheme. The
//! engine relies only on determinism, collision resistance and the binding
//! between a user and its signed message; everything downstream treats the
//! digests as opaque.

use crate::hash::{Hash, Hasher};
use crate::identifiers::{Period, Round, UserId};
use serde::{Deserialize, Serialize};

/// Deterministic digest over an ordered list of string parts.
pub fn sign_message(parts: &[&str]) -> Hash {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hasher.finalize()
}

/// `SIG(user, message[])`: a user identity bound to a deterministic digest
/// of the signed parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: UserId,
    pub signed_message: Hash,
}

impl Credential {
    /// Sign an ordered list of message parts as `user`.
    pub fn sign(user: &UserId, parts: &[&str]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(user.as_str().as_bytes());
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Credential {
            user_id: user.clone(),
            signed_message: hasher.finalize(),
        }
    }

    /// The proposer credential for `(round, period)`, attached to proposals.
    pub fn proposal(user: &UserId, round: Round, period: Period) -> Self {
        Credential::sign(user, &[&round.to_string(), &period.to_string()])
    }

    /// Digest keying a proposer's entry in the proposed-value map.
    ///
    /// Step 2's deterministic tie-break is the byte order of this digest, so
    /// it must be identical on every node for the same credential.
    pub fn proposer_hash(&self) -> Hash {
        sign_message(&[self.user_id.as_str(), &self.signed_message.to_hex()])
    }
}
