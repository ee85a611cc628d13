//! Per-user, per-route rate limiting.
//!
//! The counter lives behind `RateLimitStore`; the gateway only defines the
//! contract (key, window, limit). The in-memory store keeps one fixed
//! window per key.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub points: u32,
    pub duration_secs: u64,
}

impl RateLimit {
    pub fn new(points: u32, duration_secs: u64) -> Self {
        Self { points, duration_secs }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Outcome of a check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit store error: {0}")]
    Store(String),
}

/// Atomic check-and-increment of a counter keyed by identity + route.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check_and_increment(&self, key: &str, limit: RateLimit) -> Result<RateDecision, RateLimitError>;

    /// Number of live keys, for monitoring.
    fn tracked_keys(&self) -> usize;
}

/// Build the counter key for a caller on a route.
pub fn rate_key(subject: &str, route: &str) -> String {
    format!("{}:{}", subject, route)
}

/// A fixed counting window.
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            count: 0,
        }
    }

    fn try_acquire(&mut self, limit: RateLimit) -> RateDecision {
        let now = Instant::now();
        let window = limit.window();
        let elapsed = now.duration_since(self.started);

        // Roll over an expired window
        if elapsed >= window {
            self.started = now;
            self.count = 0;
        }

        if self.count < limit.points {
            self.count += 1;
            RateDecision::Allowed {
                remaining: limit.points - self.count,
            }
        } else {
            RateDecision::Limited {
                retry_after: window.saturating_sub(now.duration_since(self.started)),
            }
        }
    }
}

/// In-process rate limit store.
#[derive(Clone, Default)]
pub struct MemoryRateLimitStore {
    windows: Arc<DashMap<String, Arc<Mutex<Window>>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop windows idle for longer than `max_idle`.
    pub fn prune(&self, max_idle: Duration) {
        let now = Instant::now();
        self.windows.retain(|_, window| match window.lock() {
            Ok(w) => now.duration_since(w.started) < max_idle,
            Err(_) => false,
        });
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_increment(&self, key: &str, limit: RateLimit) -> Result<RateDecision, RateLimitError> {
        let window = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Window::new())))
            .clone();

        let mut window = window
            .lock()
            .map_err(|_| RateLimitError::Store("rate limit window poisoned".into()))?;
        Ok(window.try_acquire(limit))
    }

    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
