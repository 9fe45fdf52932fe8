//! Per-client admission control for the intake boundary.
//!
//! Each client address gets a fixed window of `limit` admissions per
//! `window`. Calls beyond the ceiling are rejected immediately with the time
//! until the window resets; nothing is queued.
//!
//! Where the counters live is pluggable through [`RateLimitStore`]. The
//! boundary only depends on the admit/reject decision and the reset hint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoreError;

/// Default ceiling: admissions per window per client address.
pub const DEFAULT_LIMIT: u32 = 100;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Expired windows are swept once every this many window lengths.
const SWEEP_EVERY_WINDOWS: u32 = 60;

/// Admission ceiling for one client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Rejected { retry_after: Duration },
}

/// Backing store for rate-limit counters, keyed by client address.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one call for `key` and decide whether it is admitted.
    async fn admit(&self, key: &str) -> Result<Admission, CoreError>;
}

/* --------------------------------------------------------------------------
Fixed-window counter (pure logic)
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counters for many keys. The caller supplies the clock.
#[derive(Debug)]
pub struct FixedWindowCounter {
    policy: RateLimitPolicy,
    windows: HashMap<String, Window>,
    last_sweep: Instant,
}

impl FixedWindowCounter {
    pub fn new(policy: RateLimitPolicy, now: Instant) -> Self {
        Self {
            policy,
            windows: HashMap::new(),
            last_sweep: now,
        }
    }

    /// Count a call for `key` at `now`.
    pub fn check(&mut self, key: &str, now: Instant) -> Admission {
        if now.saturating_duration_since(self.last_sweep)
            >= self.policy.window * SWEEP_EVERY_WINDOWS
        {
            self.evict_expired(now);
        }

        let window = self.policy.window;
        let entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let mut elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= window {
            entry.started = now;
            entry.count = 0;
            elapsed = Duration::ZERO;
        }

        if entry.count < self.policy.limit {
            entry.count += 1;
            Admission::Admitted {
                remaining: self.policy.limit - entry.count,
            }
        } else {
            Admission::Rejected {
                retry_after: window - elapsed,
            }
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let window = self.policy.window;
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
        self.last_sweep = now;
        before - self.windows.len()
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/* --------------------------------------------------------------------------
In-memory store
-------------------------------------------------------------------------- */

/// Process-local [`RateLimitStore`].
///
/// Counters are not shared between instances; each instance enforces the
/// ceiling on the traffic it sees.
#[derive(Debug)]
pub struct InMemoryStore {
    counter: Mutex<FixedWindowCounter>,
}

impl InMemoryStore {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            counter: Mutex::new(FixedWindowCounter::new(policy, Instant::now())),
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn admit(&self, key: &str) -> Result<Admission, CoreError> {
        Ok(self.counter.lock().await.check(key, Instant::now()))
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
