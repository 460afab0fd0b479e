//! Action types for the deterministic state machine.

use crate::{message::OutboundMessage, Event, RequestId, TimerId};
use sortis_types::{Response, UserId};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Send a message to every peer.
    ///
    /// Each send is a fire-and-forget task; its result comes back as a
    /// completion event.
    Broadcast { message: OutboundMessage },

    /// Send a message to a single peer (the `ProposeBlock` retry path).
    SendTo {
        peer: UserId,
        message: OutboundMessage,
    },

    /// Resolve a blocked inbound RPC with its response.
    Respond {
        request_id: RequestId,
        response: Response,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// (Re)arm a timer to fire after `duration`. Setting an armed timer
    /// restarts it.
    SetTimer { id: TimerId, duration: Duration },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal (fed back as events with Internal priority)
    // ═══════════════════════════════════════════════════════════════════════
    /// Enqueue an internal event for immediate processing.
    ///
    /// Internal events are processed at the same timestamp with higher
    /// priority than external events, preserving causality.
    EnqueueInternal { event: Event },
}

impl Action {
    /// Check if this action performs network I/O.
    pub fn is_network(&self) -> bool {
        matches!(self, Action::Broadcast { .. } | Action::SendTo { .. })
    }

    /// Check if this is an internal event action.
    pub fn is_internal(&self) -> bool {
        matches!(self, Action::EnqueueInternal { .. })
    }

    /// Get the action type name for logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Broadcast { .. } => "Broadcast",
            Action::SendTo { .. } => "SendTo",
            Action::Respond { .. } => "Respond",
            Action::SetTimer { .. } => "SetTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
        }
    }
}
