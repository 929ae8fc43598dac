// * Outbound Rate Limiter
// * Serializes calls to the alerting API: bounded concurrency, minimum spacing
// * between dispatch starts, FIFO queueing and an optional per-minute reservoir

use governor::{Quota, RateLimiter as GovernorLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::config::constants::{DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_TIME};
use crate::ops::telemetry::set_limiter_queue_depth;

type Reservoir = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Calls allowed in flight at once
    pub max_concurrent: usize,
    /// Minimum gap between two dispatch starts
    pub min_time: Duration,
    /// Optional cap on dispatches per minute
    pub reservoir_per_minute: Option<NonZeroU32>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            min_time: DEFAULT_MIN_TIME,
            reservoir_per_minute: None,
        }
    }
}

/// Throttles every operation scheduled through the same instance.
///
/// Waiters are admitted in arrival order (tokio's semaphore is fair) and each
/// admitted call reserves the next free dispatch slot, so start times are at
/// least `min_time` apart. Results and errors pass through untouched.
pub struct RateLimiter {
    config: RateLimiterConfig,
    permits: Semaphore,
    next_dispatch: Mutex<Option<Instant>>,
    reservoir: Option<Reservoir>,
    queued: AtomicUsize,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let reservoir = config
            .reservoir_per_minute
            .map(|per_minute| GovernorLimiter::direct(Quota::per_minute(per_minute)));

        Self {
            permits: Semaphore::new(config.max_concurrent.max(1)),
            next_dispatch: Mutex::new(None),
            reservoir,
            queued: AtomicUsize::new(0),
            config,
        }
    }

    /// Calls waiting for a concurrency permit
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Runs `operation` once the limiter admits it
    pub async fn schedule<F, Fut, T>(&self, name: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting = QueueSlot::enter(&self.queued);

        // * The semaphore is never closed, so acquire only fails if that changes
        let permit = self.permits.acquire().await.ok();

        let depth = waiting.leave();

        let slot = self.reserve_slot();
        sleep_until(slot).await;

        if let Some(reservoir) = &self.reservoir {
            reservoir.until_ready().await;
        }

        debug!(operation = name, queued = depth, "Dispatching rate-limited call");
        let output = operation().await;
        drop(permit);
        output
    }

    // * Claims the earliest start time that keeps min_time spacing
    fn reserve_slot(&self) -> Instant {
        let mut next = self
            .next_dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let slot = match *next {
            Some(reserved) if reserved > now => reserved,
            _ => now,
        };
        *next = Some(slot + self.config.min_time);
        slot
    }
}

// * Counts a caller as queued until it holds a permit or its future is dropped
struct QueueSlot<'a> {
    queued: &'a AtomicUsize,
}

impl<'a> QueueSlot<'a> {
    fn enter(queued: &'a AtomicUsize) -> Self {
        let depth = queued.fetch_add(1, Ordering::Relaxed) + 1;
        set_limiter_queue_depth(depth);
        Self { queued }
    }

    // * Returns the depth left behind
    fn leave(self) -> usize {
        let queued = self.queued;
        drop(self);
        queued.load(Ordering::Relaxed)
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        let depth = self.queued.fetch_sub(1, Ordering::Relaxed) - 1;
        set_limiter_queue_depth(depth);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use nonzero_ext::nonzero;

    #[tokio::test(start_paused = true)]
    async fn test_default_spacing_in_fifo_order() {
        let limiter = RateLimiter::default();
        let starts = Mutex::new(Vec::new());

        join_all((0..3).map(|i| {
            let limiter = &limiter;
            let starts = &starts;
            async move {
                limiter
                    .schedule("close", || async move {
                        starts.lock().unwrap().push((i, Instant::now()));
                    })
                    .await
            }
        }))
        .await;

        let starts = starts.into_inner().unwrap();
        let order: Vec<_> = starts.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2]);
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_ceiling() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 2,
            min_time: Duration::ZERO,
            reservoir_per_minute: None,
        });
        let in_flight = &AtomicUsize::new(0);
        let peak = &AtomicUsize::new(0);

        join_all((0..6).map(|_| {
            limiter.schedule("create", || async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        }))
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_and_errors_pass_through() {
        let limiter = RateLimiter::default();
        let ok: Result<u8, String> = limiter.schedule("ok", || async { Ok(1) }).await;
        let err: Result<u8, String> = limiter.schedule("err", || async { Err("boom".to_string()) }).await;

        assert_eq!(ok, Ok(1));
        assert_eq!(err, Err("boom".to_string()));
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_leaves_queue() {
        let limiter = RateLimiter::default();

        let (_, queued) = tokio::join!(
            limiter.schedule("busy", || tokio::time::sleep(Duration::from_secs(5))),
            tokio::time::timeout(Duration::from_millis(100), limiter.schedule("queued", || async {})),
        );

        assert!(queued.is_err());
        assert_eq!(limiter.queued(), 0);

        // * The permit is free again for the next caller
        assert_eq!(limiter.schedule("after", || async { 3 }).await, 3);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test]
    async fn test_reservoir_admits_burst_within_quota() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 1,
            min_time: Duration::ZERO,
            reservoir_per_minute: Some(nonzero!(5u32)),
        });

        let started = std::time::Instant::now();
        for _ in 0..3 {
            limiter.schedule("heartbeat", || async {}).await;
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
