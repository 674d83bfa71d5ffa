//! Session configuration.

use std::time::Duration;

use tocks_core::NotificationConfig;

/// Retry policy for durable writes.
///
/// Backoff starts at `initial_backoff` and doubles after each failure, capped
/// at `max_backoff`. After `max_attempts` failures the write is reported as
/// failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound on the delay.
    pub max_backoff: Duration,
    /// Attempts before giving up, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1 << exponent).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

/// Configuration for a [`crate::Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum events waiting for the dispatcher.
    pub queue_capacity: usize,
    /// Signals buffered per subscriber before it lags.
    pub signal_capacity: usize,
    /// Quiet period before a mark-read is released.
    pub debounce: Duration,
    /// Longest a mark-read may be held back by continuous requests.
    pub debounce_max_delay: Duration,
    /// Messages per replayed history chunk.
    pub history_chunk_size: usize,
    /// Most recent unread messages replayed per chat at login.
    pub history_replay_cap: usize,
    /// Durable write retries.
    pub retry: RetryPolicy,
    /// Notification rendering limits.
    pub notification: NotificationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            signal_capacity: 256,
            debounce: Duration::from_millis(300),
            debounce_max_delay: Duration::from_millis(1200),
            history_chunk_size: 64,
            history_replay_cap: 500,
            retry: RetryPolicy::default(),
            notification: NotificationConfig::default(),
        }
    }
}
