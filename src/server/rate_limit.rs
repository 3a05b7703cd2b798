//! Fixed-window rate limiting per client.

use crate::error::ConfigError;
use crate::storage::{Clock, ShardedMap, SystemClock};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Requests seen from one client in its current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Allows at most `limit` requests per client in each `window`.
///
/// Client state lives in a [`ShardedMap`] and every decision is a single
/// `compute`, so concurrent requests from one client are counted exactly.
#[derive(Debug)]
pub struct RateLimiter {
    clients: ShardedMap<String, Window>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, shard_count: usize) -> Result<Self, ConfigError> {
        Self::with_clock(limit, window, shard_count, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limit: u32,
        window: Duration,
        shard_count: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if window.is_zero() {
            return Err(ConfigError::InvalidRateWindow);
        }

        Ok(Self {
            clients: ShardedMap::new(shard_count)?,
            limit,
            window,
            clock,
        })
    }

    /// Records a request from `client` and returns whether it is allowed.
    pub fn allow(&self, client: &str) -> bool {
        let now = self.clock.now();
        let mut allowed = true;

        self.clients.compute(client.to_string(), |current| match current {
            Some(w) if !self.is_stale(w, now) => {
                if w.count >= self.limit {
                    allowed = false;
                    Some(*w)
                } else {
                    Some(Window {
                        count: w.count + 1,
                        ..*w
                    })
                }
            }
            // First request, or the previous window has run out.
            _ => Some(Window {
                started: now,
                count: 1,
            }),
        });

        allowed
    }

    /// Number of clients being tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forgets clients whose window has run out.
    ///
    /// Returns the number of clients removed. A client that sends a request
    /// between the scan and the removal keeps its fresh window.
    pub fn evict_stale(&self) -> usize {
        let now = self.clock.now();

        let mut stale = Vec::new();
        self.clients.range(|client, w| {
            if self.is_stale(w, now) {
                stale.push(client.clone());
            }
            ControlFlow::Continue(())
        });

        stale
            .iter()
            .filter(|client| {
                self.clients
                    .remove_if(client.as_str(), |w| self.is_stale(w, now))
            })
            .count()
    }

    #[inline]
    fn is_stale(&self, w: &Window, now: Instant) -> bool {
        now.duration_since(w.started) > self.window
    }
}

/// Runs [`RateLimiter::evict_stale`] once per window until the handle is
/// aborted.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_eviction(limiter: Arc<RateLimiter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let evicted = limiter.evict_stale();
            if evicted > 0 {
                debug!(
                    evicted = evicted,
                    remaining = limiter.tracked_clients(),
                    "Evicted idle rate limit windows"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ManualClock;
    use std::thread;

    fn limiter(limit: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter =
            RateLimiter::with_clock(limit, Duration::from_secs(60), 8, clock.clone()).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_allows_up_to_limit() {
        let (limiter, _) = limiter(3);

        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn test_clients_are_independent() {
        let (limiter, _) = limiter(1);

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_window_resets() {
        let (limiter, clock) = limiter(1);

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        clock.advance(Duration::from_secs(61));
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = RateLimiter::new(10, Duration::ZERO, 8);
        assert_eq!(result.unwrap_err(), ConfigError::InvalidRateWindow);
    }

    #[test]
    fn test_concurrent_requests_counted_exactly() {
        let (limiter, _) = limiter(100);
        let limiter = Arc::new(limiter);
        let mut handles = vec![];

        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(thread::spawn(move || {
                (0..50).filter(|_| limiter.allow("shared")).count()
            }));
        }

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }

    #[test]
    fn test_evict_stale_windows() {
        let (limiter, clock) = limiter(5);

        limiter.allow("idle");
        clock.advance(Duration::from_secs(30));
        limiter.allow("active");

        // Only "idle" has been quiet for longer than a window.
        clock.advance(Duration::from_secs(31));
        assert_eq!(limiter.evict_stale(), 1);
        assert_eq!(limiter.tracked_clients(), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.evict_stale(), 1);
        assert_eq!(limiter.tracked_clients(), 0);
        assert_eq!(limiter.evict_stale(), 0);
    }

    #[test]
    fn test_evicted_client_starts_fresh() {
        let (limiter, clock) = limiter(1);

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        clock.advance(Duration::from_secs(61));
        limiter.evict_stale();

        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
    }

    #[tokio::test]
    async fn test_spawned_eviction_shrinks_client_map() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_millis(20), 4).unwrap());
        for i in 0..100 {
            limiter.allow(&format!("10.0.0.{}", i));
        }
        assert_eq!(limiter.tracked_clients(), 100);

        let handle = spawn_eviction(Arc::clone(&limiter));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert_eq!(limiter.tracked_clients(), 0);
    }
}
