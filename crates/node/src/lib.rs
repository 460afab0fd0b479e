//! Node composition.
//!
//! [`NodeStateMachine`] wires the agreement state machine, the transaction
//! staging buffer and the in-memory ledger into one [`StateMachine`]
//! (`sortis_core::StateMachine`) that runners drive with events.

mod ledger;
mod state;

pub use ledger::{AcceptAll, ChainVerifier, LedgerState, LinkVerifier};
pub use state::NodeStateMachine;
