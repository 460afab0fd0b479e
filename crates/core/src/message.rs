//! Outbound message types for network communication.

use sortis_types::{
    AppendTransactionArgs, ProposeBlockArgs, Request, RequestChainArgs, VoteArgs,
};

/// Outbound network messages.
///
/// These are the requests a node originates towards its peers. The runner
/// handles the actual network I/O and feeds results back as completion
/// events.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Step-1 value proposal.
    ProposeBlock(ProposeBlockArgs),

    /// A soft, cert or next vote.
    Vote(VoteArgs),

    /// Relay of a client-submitted transaction.
    AppendTransaction(AppendTransactionArgs),

    /// Catch-up pull: ask peers for their chains.
    RequestChain(RequestChainArgs),
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::ProposeBlock(_) => "ProposeBlock",
            OutboundMessage::Vote(_) => "Vote",
            OutboundMessage::AppendTransaction(_) => "AppendTransaction",
            OutboundMessage::RequestChain(_) => "RequestChain",
        }
    }

    /// The wire request this message becomes.
    pub fn into_request(self) -> Request {
        match self {
            OutboundMessage::ProposeBlock(args) => Request::ProposeBlock(args),
            OutboundMessage::Vote(args) => Request::Vote(args),
            OutboundMessage::AppendTransaction(args) => Request::AppendTransaction(args),
            OutboundMessage::RequestChain(args) => Request::RequestChain(args),
        }
    }
}
