//! Environment abstraction for deterministic testing.
//!
//! Decouples timing logic (debounce windows, retry backoff) from the system
//! clock. Production uses the tokio clock; tests pause it and advance virtual
//! time.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use crate::model::Timestamp;

/// Abstract environment providing time and sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time, used to stamp locally generated events.
    fn wall_clock(&self) -> Timestamp;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps; state machines take `now` as an argument.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Sleeps until `deadline`. Returns immediately if it already passed.
    fn sleep_until(
        &self,
        deadline: Self::Instant,
    ) -> impl std::future::Future<Output = ()> + Send {
        let now = self.now();
        let remaining = if deadline > now { deadline - now } else { Duration::ZERO };
        self.sleep(remaining)
    }
}
