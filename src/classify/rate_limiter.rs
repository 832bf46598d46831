// Minimum-interval rate limiter for the metered classifier tiers.
//
// Each acquire reserves the next free slot while holding the lock, then
// releases the lock and sleeps until that slot, so concurrent callers queue
// behind each other instead of racing through together. A slot is only a
// hint: on wake-up the caller checks the actual time of the last release and
// goes back to sleep if it is still too early. A caller that wakes late
// therefore delays everyone queued behind it. The lock is never held across
// an await.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default spacing between classifier calls.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// A rate limiter that enforces a minimum spacing between calls.
///
/// Cheap to clone; clones share the same schedule.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
}

struct RateLimiterInner {
    /// Minimum time between requests
    interval: Duration,
    /// The slot handed to the most recent caller
    last_reserved: Option<Instant>,
    /// When the most recent caller was actually let through
    last_release: Option<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_MS)
    }
}

impl RateLimiter {
    /// Create a rate limiter with the given minimum interval in milliseconds.
    /// An interval of 0 disables waiting.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                interval: Duration::from_millis(interval_ms),
                last_reserved: None,
                last_release: None,
            })),
        }
    }

    /// Wait until a request is allowed, then return.
    ///
    /// Returns immediately when the previous release is at least `interval` old.
    pub async fn acquire(&self) {
        let mut slot = self.reserve();
        loop {
            let now = Instant::now();
            if slot > now {
                debug!(
                    delay_ms = (slot - now).as_millis() as u64,
                    "Rate limit: waiting before classifier call"
                );
                tokio::time::sleep_until(slot).await;
            }
            match self.try_release() {
                Ok(()) => return,
                Err(next) => slot = next,
            }
        }
    }

    /// Claim the next slot behind every earlier reservation and release.
    fn reserve(&self) -> Instant {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let slot = match inner.last_reserved.max(inner.last_release) {
            Some(last) => (last + inner.interval).max(now),
            None => now,
        };
        inner.last_reserved = Some(slot);
        slot
    }

    /// Let the caller through if `interval` has passed since the last
    /// release, otherwise return the earliest instant worth retrying.
    fn try_release(&self) -> Result<(), Instant> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(last) = inner.last_release {
            let earliest = last + inner.interval;
            if earliest > now {
                return Err(earliest);
            }
        }
        inner.last_release = Some(now);
        Ok(())
    }

    /// Current minimum interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.interval.as_millis() as u64
    }

    /// Change the minimum interval. Negative values are rejected and leave
    /// the current interval unchanged.
    pub fn set_interval_ms(&self, ms: i64) -> bool {
        let Ok(ms) = u64::try_from(ms) else {
            warn!(ms, "Rejected negative rate limit interval");
            return false;
        };
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.interval = Duration::from_millis(ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_allows_first_request_immediately() {
        let limiter = RateLimiter::new(1000);
        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        // First request should be near-instant
        assert!(elapsed < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_rate_limiter_delays_second_request() {
        let limiter = RateLimiter::new(300);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(250),
            "Expected ~300ms delay, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquires_are_spaced() {
        let limiter = RateLimiter::new(100);
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(50),
                "Concurrent acquires too close: {:?}",
                pair[1] - pair[0]
            );
        }
        assert!(times[3] - start >= Duration::from_millis(280));
    }

    #[tokio::test]
    async fn test_late_wakeup_delays_queued_caller() {
        let limiter = RateLimiter::new(200);
        limiter.acquire().await;

        let first = limiter.clone();
        let a = tokio::spawn(async move {
            first.acquire().await;
            Instant::now()
        });
        let second = limiter.clone();
        let b = tokio::spawn(async move {
            second.acquire().await;
            Instant::now()
        });

        // Both callers have reserved their slots by now. Starve the only
        // worker thread across the first slot so that caller wakes late.
        tokio::time::sleep(Duration::from_millis(120)).await;
        std::thread::sleep(Duration::from_millis(250));

        let a_at = a.await.unwrap();
        let b_at = b.await.unwrap();
        let (earlier, later) = if a_at <= b_at { (a_at, b_at) } else { (b_at, a_at) };
        assert!(
            later - earlier >= Duration::from_millis(190),
            "Releases too close after a late wake-up: {:?}",
            later - earlier
        );
    }

    #[test]
    fn test_negative_interval_rejected() {
        let limiter = RateLimiter::new(250);
        assert!(!limiter.set_interval_ms(-1));
        assert_eq!(limiter.interval_ms(), 250);
        assert!(limiter.set_interval_ms(0));
        assert_eq!(limiter.interval_ms(), 0);
    }
}
