//! RPC request and response surface.
//!
//! Every request carries the sending peer's identity. Each request maps to
//! exactly one response; the transport delivers them as paired frames.

use crate::block::{Block, Blockchain, Transaction};
use crate::credential::Credential;
use crate::identifiers::{Round, UserId};
use crate::value::Value;
use crate::vote::SignedVote;
use serde::{Deserialize, Serialize};

/// Adopt the attached chain if it is strictly longer than the local one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendBlockArgs {
    pub chain: Blockchain,
    pub peer: UserId,
}

/// Append a transaction to the staging buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendTransactionArgs {
    pub tx: Transaction,
    pub peer: UserId,
}

/// A step-1 value proposal with its sortition credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeBlockArgs {
    pub block: Block,
    pub credential: Credential,
    pub value: Value,
    pub round: Round,
    pub peer: UserId,
}

/// A soft, cert or next vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteArgs {
    pub vote: SignedVote,
    pub round: Round,
    pub peer: UserId,
}

/// Ask a peer for its full chain (catch-up pull).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestChainArgs {
    pub peer: UserId,
}

/// A request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    AppendBlock(AppendBlockArgs),
    AppendTransaction(AppendTransactionArgs),
    ProposeBlock(ProposeBlockArgs),
    Vote(VoteArgs),
    RequestChain(RequestChainArgs),
}

impl Request {
    /// The request type name, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::AppendBlock(_) => "AppendBlock",
            Request::AppendTransaction(_) => "AppendTransaction",
            Request::ProposeBlock(_) => "ProposeBlock",
            Request::Vote(_) => "Vote",
            Request::RequestChain(_) => "RequestChain",
        }
    }

    /// The sending peer.
    pub fn peer(&self) -> &UserId {
        match self {
            Request::AppendBlock(args) => &args.peer,
            Request::AppendTransaction(args) => &args.peer,
            Request::ProposeBlock(args) => &args.peer,
            Request::Vote(args) => &args.peer,
            Request::RequestChain(args) => &args.peer,
        }
    }
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// Outcome of an `AppendBlock`, `AppendTransaction`, `ProposeBlock` or
    /// `Vote` request.
    Ack { success: bool },
    /// Reply to `RequestChain`: the responder's identity and full chain.
    Chain { peer: UserId, chain: Blockchain },
}

impl Response {
    pub fn ack(success: bool) -> Self {
        Response::Ack { success }
    }

    /// The `success` flag, treating a chain reply as success.
    pub fn is_success(&self) -> bool {
        match self {
            Response::Ack { success } => *success,
            Response::Chain { .. } => true,
        }
    }
}
