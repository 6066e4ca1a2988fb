//! Fixed-cadence iteration scheduling.
//!
//! Iterations start a fixed interval apart regardless of how long each one
//! takes: the scheduler measures elapsed execution time through the injected
//! clock and sleeps only for the remainder. An iteration that overruns its
//! interval is followed immediately by the next one.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;

pub struct Scheduler<C: Clock> {
    interval: Duration,
    clock: C,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(interval: Duration, clock: C) -> Self {
        Self { interval, clock }
    }

    /// Drive `iteration` until cancelled. An iteration error is logged and
    /// the cadence continues; only cancellation ends the loop.
    pub async fn run<F, Fut>(&self, cancel: CancellationToken, mut iteration: F) -> Result<()>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut count: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let started = self.clock.now();

            if let Err(e) = iteration(count).await {
                error!(iteration = count, error = %format!("{e:#}"), "iteration failed");
            }

            count += 1;

            if cancel.is_cancelled() {
                break;
            }

            let elapsed = self.clock.now().saturating_duration_since(started);

            match self.interval.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => {
                    debug!(?remaining, "sleeping until next iteration");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.clock.sleep(remaining) => {}
                    }
                }
                _ => {
                    warn!(
                        ?elapsed,
                        interval = ?self.interval,
                        "iteration overran the interval, starting the next immediately",
                    );
                }
            }
        }

        info!(iterations = count, "scheduler stopped");

        Ok(())
    }
}
