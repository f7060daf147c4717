//! One-shot signal channel used as the pass oracle.
//!
//! The script thread fires the channel from inside `alert`; the harness thread blocks on it with a bound.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    #[default]
    Pending,
    Fired,
}

/// A latch that goes from `Pending` to `Fired` exactly once.
#[derive(Debug, Default)]
pub struct SignalChannel {
    state: Mutex<SignalState>,
    fired: Condvar,
}

impl SignalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the channel. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SignalState::Fired {
            return false;
        }
        *state = SignalState::Fired;
        self.fired.notify_all();
        true
    }

    pub fn state(&self) -> SignalState {
        *self.state.lock()
    }

    pub fn is_fired(&self) -> bool {
        self.state() == SignalState::Fired
    }

    /// Block until the channel fires or `timeout` elapses. Returns whether it fired.
    ///
    /// A channel that fired before the call returns immediately.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while *state == SignalState::Pending {
                    if self.fired.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while *state == SignalState::Pending {
                    self.fired.wait(&mut state);
                }
            }
        }
        *state == SignalState::Fired
    }
}

/// Watches every signal a page raises and fires the channel on the sentinel.
#[derive(Debug)]
pub struct SentinelWatcher {
    sentinel: String,
    channel: Arc<SignalChannel>,
    seen: Mutex<Vec<String>>,
}

impl SentinelWatcher {
    pub fn new(sentinel: impl Into<String>, channel: Arc<SignalChannel>) -> Self {
        Self {
            sentinel: sentinel.into(),
            channel,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Record one signal. Only an exact match of the sentinel fires the channel.
    pub fn on_signal(&self, message: &str) {
        info!("alert: {}", message);
        self.seen.lock().push(message.to_string());
        if message == self.sentinel && !self.channel.fire() {
            debug!("sentinel observed again after the channel fired");
        }
    }

    /// Every signal seen so far, in arrival order.
    pub fn signals(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_fire_once() {
        let channel = SignalChannel::new();
        assert_eq!(channel.state(), SignalState::Pending);
        assert!(channel.fire());
        assert!(!channel.fire());
        assert!(channel.is_fired());
    }

    #[test]
    fn test_fire_before_wait_returns_immediately() {
        let channel = SignalChannel::new();
        channel.fire();
        let started = Instant::now();
        assert!(channel.wait_timeout(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_times_out() {
        let channel = SignalChannel::new();
        let started = Instant::now();
        assert!(!channel.wait_timeout(Duration::from_millis(100)));
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(channel.state(), SignalState::Pending);
    }

    #[test]
    fn test_fire_from_another_thread_wakes_waiter() {
        let channel = Arc::new(SignalChannel::new());
        let firing = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            firing.fire();
        });
        assert!(channel.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_watcher_fires_only_on_exact_sentinel() {
        let channel = Arc::new(SignalChannel::new());
        let watcher = SentinelWatcher::new("test log alert", Arc::clone(&channel));

        watcher.on_signal("test log alert ");
        watcher.on_signal("TEST LOG ALERT");
        assert!(!channel.is_fired());

        watcher.on_signal("test log alert");
        watcher.on_signal("test log alert");
        assert!(channel.is_fired());
        assert_eq!(watcher.signals().len(), 4);
    }
}
