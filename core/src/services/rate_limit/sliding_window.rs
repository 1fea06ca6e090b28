//! Sliding-window rate limiter

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use ag_shared::config::RateLimitConfig;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::RateLimiter;

type Bucket = Arc<Mutex<VecDeque<Instant>>>;

/// Tracks the admission instants of every client inside the trailing window.
///
/// Pruning, counting and recording happen under the client's own mutex, so
/// concurrent callers sharing a client id can never jointly exceed `limit`.
/// The outer map lock is only held to find or create a bucket.
///
/// Buckets are created lazily and kept forever unless
/// [`evict_idle`](Self::evict_idle) is called.
pub struct SlidingWindowRateLimiter {
    limit: usize,
    window: Duration,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit as usize,
            window,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_seconds))
    }

    pub fn limit(&self) -> u32 {
        self.limit as u32
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of client buckets currently held
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Admits or rejects one call at `now`
    pub fn check_at(&self, client_id: &str, now: Instant) -> bool {
        let bucket = self.bucket(client_id);
        let mut admitted = bucket.lock().unwrap_or_else(PoisonError::into_inner);

        prune(&mut admitted, now, self.window);
        if admitted.len() < self.limit {
            admitted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops buckets with no admissions left inside the window
    ///
    /// Returns the number of buckets removed. A bucket another caller is
    /// currently holding is kept.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();

        buckets.retain(|_, bucket| {
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            let mut admitted = bucket.lock().unwrap_or_else(PoisonError::into_inner);
            prune(&mut admitted, now, self.window);
            !admitted.is_empty()
        });

        before - buckets.len()
    }

    /// Runs [`evict_idle`](Self::evict_idle) every `interval`
    pub fn start_idle_sweep(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_seconds = interval.as_secs(), "Rate limiter idle sweep started");
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let evicted = self.evict_idle();
                if evicted > 0 {
                    debug!(evicted, "Evicted idle rate limit buckets");
                }
            }
        })
    }

    fn bucket(&self, client_id: &str) -> Bucket {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client_id)
        {
            return bucket.clone();
        }

        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(client_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowRateLimiter {
    async fn allow(&self, client_id: &str) -> bool {
        self.check_at(client_id, Instant::now())
    }
}

/// Removes admissions at or before `now - window`
fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    // Early in the process lifetime the window can reach before the clock's origin
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    while admitted.front().is_some_and(|&at| at <= cutoff) {
        admitted.pop_front();
    }
}
