//! Timer management for the production runner.
//!
//! Provides a tokio-based timer implementation for the deterministic state
//! machine. Timers are spawned as tokio tasks and can be restarted.

use sortis_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Convert a TimerId to the corresponding Event.
fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::Round => Event::RoundTimer,
        TimerId::Agreement => Event::AgreementTimer,
    }
}

/// Manages timers for the production runner.
///
/// Each timer is a tokio task that sleeps for the specified duration and
/// then sends the appropriate timer event to the event channel. Setting a
/// timer that is already armed restarts it, which is exactly the protocol's
/// restart-on-tick cadence.
pub struct TimerManager {
    /// Active timers (id -> task handle).
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// Event sender for timer fires.
    event_tx: mpsc::Sender<Event>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            timers: HashMap::new(),
            event_tx,
        }
    }

    /// Set a timer that will fire after the given duration.
    ///
    /// If a timer with the same ID already exists, it is cancelled first.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);

        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            trace!(?id, ?duration, "Timer task started, sleeping");
            tokio::time::sleep(duration).await;
            trace!(?id, "Timer fired, sending event");
            let _ = event_tx.send(timer_event(id)).await;
        });

        self.timers.insert(id, handle);
        debug!(?id, ?duration, "Timer set");
    }

    /// Cancel a timer.
    ///
    /// If the timer doesn't exist or has already fired, this is a no-op.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            trace!(?id, "Timer cancelled");
        }
    }

    /// Cancel all timers.
    ///
    /// Called during shutdown.
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "Timer cancelled (shutdown)");
        }
    }

    /// Get the number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_timer_fires() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Round, Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");

        assert!(matches!(event, Event::RoundTimer));
    }

    #[tokio::test]
    async fn test_timer_cancel() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Round, Duration::from_millis(50));
        manager.cancel_timer(TimerId::Round);

        let result = tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await;
        assert!(result.is_err(), "Timer should have been cancelled");
    }

    #[tokio::test]
    async fn test_timer_restart() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        // Set the agreement timer for 100ms, then compress it to 10ms the
        // way the step-5 poll cadence does.
        manager.set_timer(TimerId::Agreement, Duration::from_millis(100));
        manager.set_timer(TimerId::Agreement, Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_millis(50), event_rx.recv())
            .await
            .expect("timeout - timer didn't fire quickly")
            .expect("channel closed");

        assert!(matches!(event, Event::AgreementTimer));
    }

    #[tokio::test]
    async fn test_both_timers_run_independently() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Round, Duration::from_millis(10));
        manager.set_timer(TimerId::Agreement, Duration::from_millis(20));

        assert_eq!(manager.active_count(), 2);

        let first = tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        let second = tokio::time::timeout(Duration::from_millis(100), event_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");

        assert!(matches!(first, Event::RoundTimer));
        assert!(matches!(second, Event::AgreementTimer));
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::Round, Duration::from_millis(50));
        manager.set_timer(TimerId::Agreement, Duration::from_millis(50));

        assert_eq!(manager.active_count(), 2);

        manager.cancel_all();

        assert_eq!(manager.active_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(100), event_rx.recv()).await;
        assert!(result.is_err(), "No timers should have fired");
    }
}
