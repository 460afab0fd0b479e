//! Event types for the deterministic state machine.

use crate::RequestId;
use sortis_types::{
    AppendBlockArgs, AppendTransactionArgs, Block, Blockchain, ProposeBlockArgs, RequestChainArgs,
    Transaction, UserId, Value, VoteArgs,
};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    /// Processed first to maintain causality.
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,

    /// Client events: external inputs from users.
    Client = 3,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// Time to start a round (step 1), if the node is ready for one.
    RoundTimer,

    /// Time to advance and run the next agreement step (2-5).
    AgreementTimer,

    // ═══════════════════════════════════════════════════════════════════════
    // Inbound RPCs (priority: Network)
    // Each carries the RequestId the runner uses to route the reply.
    // ═══════════════════════════════════════════════════════════════════════
    /// A peer pushed a chain at us.
    AppendBlockRequest {
        args: AppendBlockArgs,
        request_id: RequestId,
    },

    /// A peer relayed a staged transaction.
    AppendTransactionRequest {
        args: AppendTransactionArgs,
        request_id: RequestId,
    },

    /// A peer proposed a value for the current round.
    ProposeBlockRequest {
        args: ProposeBlockArgs,
        request_id: RequestId,
    },

    /// A peer cast a soft, cert or next vote.
    VoteRequest {
        args: VoteArgs,
        request_id: RequestId,
    },

    /// A peer asked for our chain.
    RequestChainRequest {
        args: RequestChainArgs,
        request_id: RequestId,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Outbound completions (priority: Internal)
    // Results of fire-and-forget RPC tasks spawned by the runner.
    // ═══════════════════════════════════════════════════════════════════════
    /// A `ProposeBlock` send finished. `success` is false on transport
    /// failure or a `Success=false` reply; either triggers the retry path.
    ProposeBlockCompleted { peer: UserId, success: bool },

    /// A `Vote` send finished. Failures are logged only.
    VoteCompleted { peer: UserId, success: bool },

    /// An `AppendTransaction` send finished. Failures are logged only.
    AppendTransactionCompleted { peer: UserId, success: bool },

    /// A `RequestChain` round-trip delivered a peer's chain.
    ChainReceived { peer: UserId, chain: Blockchain },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal Events (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// The halting predicate fired: agreement was reached on `value` and the
    /// ledger must append `block` before the next round starts.
    RoundCommitted { value: Value, block: Block },

    // ═══════════════════════════════════════════════════════════════════════
    // Client Requests (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// Client submitted a transaction.
    SubmitTransaction {
        tx: Transaction,
        request_id: RequestId,
    },
}

impl Event {
    /// Get the priority for this event type.
    ///
    /// Events at the same timestamp are processed in priority order,
    /// ensuring causality is preserved.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::RoundCommitted { .. }
            | Event::ProposeBlockCompleted { .. }
            | Event::VoteCompleted { .. }
            | Event::AppendTransactionCompleted { .. }
            | Event::ChainReceived { .. } => EventPriority::Internal,

            Event::RoundTimer | Event::AgreementTimer => EventPriority::Timer,

            Event::AppendBlockRequest { .. }
            | Event::AppendTransactionRequest { .. }
            | Event::ProposeBlockRequest { .. }
            | Event::VoteRequest { .. }
            | Event::RequestChainRequest { .. } => EventPriority::Network,

            Event::SubmitTransaction { .. } => EventPriority::Client,
        }
    }

    /// Check if this is an internal event (consequence of prior processing).
    pub fn is_internal(&self) -> bool {
        self.priority() == EventPriority::Internal
    }

    /// Check if this is a network event (from another node).
    pub fn is_network(&self) -> bool {
        self.priority() == EventPriority::Network
    }

    /// Get the event type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::RoundTimer => "RoundTimer",
            Event::AgreementTimer => "AgreementTimer",
            Event::AppendBlockRequest { .. } => "AppendBlockRequest",
            Event::AppendTransactionRequest { .. } => "AppendTransactionRequest",
            Event::ProposeBlockRequest { .. } => "ProposeBlockRequest",
            Event::VoteRequest { .. } => "VoteRequest",
            Event::RequestChainRequest { .. } => "RequestChainRequest",
            Event::ProposeBlockCompleted { .. } => "ProposeBlockCompleted",
            Event::VoteCompleted { .. } => "VoteCompleted",
            Event::AppendTransactionCompleted { .. } => "AppendTransactionCompleted",
            Event::ChainReceived { .. } => "ChainReceived",
            Event::RoundCommitted { .. } => "RoundCommitted",
            Event::SubmitTransaction { .. } => "SubmitTransaction",
        }
    }
}
