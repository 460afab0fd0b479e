//! The state machine trait.

use crate::{Action, Event};
use std::time::Duration;

/// A deterministic, synchronous state machine.
///
/// Runners deliver one event at a time and execute the returned actions;
/// the state machine performs no I/O of its own. `set_time` is called by
/// the runner before `handle` so the machine observes a consistent clock.
pub trait StateMachine {
    /// Process one event, returning the actions it provokes.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Advance the machine's view of the current time.
    fn set_time(&mut self, now: Duration);

    /// The machine's view of the current time.
    fn now(&self) -> Duration;
}
