//! Per-identity admission control using a sliding window log.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for the rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Length of the sliding window
    pub window: Duration,
    /// Maximum requests admitted per identity within the window
    pub max_requests: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new configuration
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Set the window length
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the window capacity
    pub fn max_requests(mut self, n: u32) -> Self {
        self.max_requests = n;
        self
    }
}

/// Sliding window log rate limiter
///
/// Tracks one timestamp per admitted request, per identity. A request is
/// admitted when fewer than `max_requests` timestamps fall inside the
/// trailing window. The check-then-append sequence is a single atomic unit
/// under the table lock, so concurrent requests from one identity at the
/// capacity boundary cannot both claim the last slot.
pub struct RateLimiter {
    config: RateLimiterConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    total_checks: AtomicU64,
    total_denials: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter with default configuration
    pub fn new() -> Self {
        Self::with_config(RateLimiterConfig::default())
    }

    /// Create a new rate limiter with custom configuration
    pub fn with_config(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            total_checks: AtomicU64::new(0),
            total_denials: AtomicU64::new(0),
        }
    }

    /// Check whether a request from `identity` may proceed now
    ///
    /// Admission appends the current timestamp; denial leaves the stored
    /// set untouched apart from pruning expired entries.
    pub fn admit(&self, identity: &str) -> bool {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut windows = self.windows.lock();
        let window = windows.entry(identity.to_string()).or_default();
        Self::prune(window, now, self.config.window);

        if (window.len() as u32) < self.config.max_requests {
            window.push_back(now);
            true
        } else {
            self.total_denials.fetch_add(1, Ordering::Relaxed);
            debug!(identity, limit = self.config.max_requests, "request denied by rate limiter");
            false
        }
    }

    /// Get the number of requests `identity` may still make in the current window
    pub fn remaining(&self, identity: &str) -> u32 {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(identity) {
            Some(window) => {
                Self::prune(window, now, self.config.window);
                self.config.max_requests.saturating_sub(window.len() as u32)
            }
            None => self.config.max_requests,
        }
    }

    /// Get the time until the oldest counted request leaves the window
    ///
    /// Returns [`Duration::ZERO`] when the identity has no live timestamps.
    pub fn reset_in(&self, identity: &str) -> Duration {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(identity) {
            Some(window) => {
                Self::prune(window, now, self.config.window);
                window
                    .front()
                    .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            }
            None => Duration::ZERO,
        }
    }

    /// Remove identities whose newest request is older than `max_age`
    ///
    /// Bounds memory growth from one-shot or abandoned identities. Safe to
    /// run concurrently with admission checks. Returns the number of
    /// identities removed.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < max_age)
        });
        let evicted = before - windows.len();
        if evicted > 0 {
            info!(evicted, "evicted stale rate limit entries");
        }
        evicted
    }

    /// Get the number of identities currently tracked
    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().len()
    }

    /// Get the total number of admission checks performed
    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    /// Get the total number of denied requests
    pub fn total_denials(&self) -> u64 {
        self.total_denials.load(Ordering::Relaxed)
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    // Window boundaries are half-open: a timestamp exactly `window` old is expired.
    fn prune(window: &mut VecDeque<Instant>, now: Instant, window_size: Duration) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= window_size {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_identities", &self.tracked_identities())
            .field("total_checks", &self.total_checks())
            .field("total_denials", &self.total_denials())
            .finish()
    }
}
