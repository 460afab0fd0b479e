//! Deterministic simulation of a sortis quorum.
//!
//! Runs any number of node state machines against a simulated network in a
//! single thread with simulated time. Given the same seed, a run is
//! reproducible event for event, which is what the end-to-end scenario
//! tests build on.

mod network;
mod runner;

pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{NodeIndex, SimulationRunner, SimulationStats};
