//! Injected time source.
//!
//! The scheduler and the probe executor never call the system clock or the
//! tokio timer directly; everything time-related goes through [`Clock`] so
//! tests can substitute a deterministic clock.

use std::time::{Duration, Instant};

/// Monotonic time source with a cooperative sleep.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend for the given duration.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Clock backed by the system monotonic clock and the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
