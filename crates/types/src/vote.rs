//! Vote types.

use crate::credential::Credential;
use crate::hash::Hash;
use crate::identifiers::{Period, UserId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three BA★ vote types, with their wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoteKind {
    Soft,
    Cert,
    Next,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteKind::Soft => "soft",
            VoteKind::Cert => "cert",
            VoteKind::Next => "next",
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteKind {
    type Err = UnknownVoteKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soft" => Ok(VoteKind::Soft),
            "cert" => Ok(VoteKind::Cert),
            "next" => Ok(VoteKind::Next),
            other => Err(UnknownVoteKind(other.to_string())),
        }
    }
}

/// An unrecognised vote-type string on the wire.
#[derive(Debug, thiserror::Error)]
#[error("Unknown vote kind: {0}")]
pub struct UnknownVoteKind(pub String);

/// A vote as broadcast: the voter's `SIG` over `[value, kind, period]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedVote {
    pub voter: UserId,
    pub value: Value,
    pub kind: VoteKind,
    pub period: Period,
    /// Digest binding the voter to the payload.
    pub signature: Hash,
}

impl SignedVote {
    /// Sign a vote as `voter`.
    pub fn sign(voter: &UserId, value: Value, kind: VoteKind, period: Period) -> Self {
        let signature = Self::payload_digest(voter, value, kind, period);
        SignedVote {
            voter: voter.clone(),
            value,
            kind,
            period,
            signature,
        }
    }

    /// Check the signature binds this voter to this payload.
    pub fn verify(&self) -> bool {
        self.signature == Self::payload_digest(&self.voter, self.value, self.kind, self.period)
    }

    fn payload_digest(voter: &UserId, value: Value, kind: VoteKind, period: Period) -> Hash {
        Credential::sign(
            voter,
            &[&value.to_string(), kind.as_str(), &period.to_string()],
        )
        .signed_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_kind_strings() {
        assert_eq!(VoteKind::Soft.as_str(), "soft");
        assert_eq!("cert".parse::<VoteKind>().unwrap(), VoteKind::Cert);
        assert!("hard".parse::<VoteKind>().is_err());
    }

    #[test]
    fn signed_vote_verifies() {
        let voter = UserId("3001".into());
        let vote = SignedVote::sign(&voter, Value::Bottom, VoteKind::Next, Period(2));
        assert!(vote.verify());

        let mut forged = vote.clone();
        forged.voter = UserId("3002".into());
        assert!(!forged.verify());
    }
}
