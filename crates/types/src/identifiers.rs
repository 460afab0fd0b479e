//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant identity.
///
/// Bootstrap derives it from the port substring of the peer's `host:port`
/// address, so the lexicographic order of the sorted registry is the same on
/// every node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Derive the user id from a `host:port` address (the port substring).
    pub fn from_address(addr: &str) -> Self {
        match addr.rsplit_once(':') {
            Some((_, port)) => UserId(port.to_string()),
            None => UserId(addr.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger height under agreement. Starts at 1 and only advances on halting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Round(pub u64);

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Retry slot within a round. Resets to 1 on round advance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Period(pub u64);

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cursor within a period. Non-decreasing except for the period transition
/// out of step 5, which resets it to [`Step::Propose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    /// Step 1: value proposal.
    Propose,
    /// Step 2: soft-vote.
    Soft,
    /// Step 3: cert-vote.
    Cert,
    /// Step 4: next-vote, commit branch.
    NextCommit,
    /// Step 5: next-vote, fallback branch.
    NextFallback,
}

impl Step {
    /// The step that follows this one, saturating at step 5.
    pub fn advanced(self) -> Step {
        match self {
            Step::Propose => Step::Soft,
            Step::Soft => Step::Cert,
            Step::Cert => Step::NextCommit,
            Step::NextCommit | Step::NextFallback => Step::NextFallback,
        }
    }

    /// 1-based step number.
    pub fn number(self) -> u8 {
        match self {
            Step::Propose => 1,
            Step::Soft => 2,
            Step::Cert => 3,
            Step::NextCommit => 4,
            Step::NextFallback => 5,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}
