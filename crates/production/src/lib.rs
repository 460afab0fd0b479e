//! Production runtime for a sortis node.
//!
//! Wraps the deterministic [`NodeStateMachine`](sortis_node::NodeStateMachine)
//! in a tokio event loop:
//!
//! - [`TimerManager`] turns `SetTimer` actions into timer events
//! - [`network::RpcServer`] posts inbound requests with oneshot replies
//! - [`network::PeerClient`] handles perform the outbound round-trips
//! - [`Runner`] multiplexes everything and executes actions
//!
//! The binary (`sortis-node`) wires these together from CLI arguments.

pub mod network;

mod runner;
mod timers;

pub use runner::{Runner, ShutdownHandle};
pub use timers::TimerManager;
