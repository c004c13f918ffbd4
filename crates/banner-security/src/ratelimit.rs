//! Rate limit keys and the fixed-window limiter.

use std::time::{Duration, Instant};

use banner_core::RateLimitSettings;
use dashmap::DashMap;

use crate::header_names;

/// Sentinel used for a missing client address or path.
pub const UNKNOWN: &str = "unknown";

/// Derive the bucketing key for a client and route.
///
/// Missing or empty parts become `"unknown"`.
pub fn rate_limit_key(ip: Option<&str>, path: Option<&str>) -> String {
    let ip = ip.filter(|s| !s.is_empty()).unwrap_or(UNKNOWN);
    let path = path.filter(|s| !s.is_empty()).unwrap_or(UNKNOWN);
    format!("{}-{}", ip, path)
}

/// Result of counting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }

    /// Standard rate limit headers, plus `Retry-After` when denied.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            (header_names::RATE_LIMIT_LIMIT.to_string(), self.limit.to_string()),
            (
                header_names::RATE_LIMIT_REMAINING.to_string(),
                self.remaining.to_string(),
            ),
            (
                header_names::RATE_LIMIT_RESET.to_string(),
                self.retry_after_secs().to_string(),
            ),
        ];

        if !self.allowed {
            headers.push((
                header_names::RETRY_AFTER.to_string(),
                self.retry_after_secs().to_string(),
            ));
        }

        headers
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Concurrent fixed-window request counter.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.window(), settings.max_requests)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request for `key`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` as of `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = entry.count < self.max_requests;
        if allowed {
            entry.count += 1;
        }

        let elapsed = now.saturating_duration_since(entry.started);
        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests - entry.count,
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    /// Drop windows that have ended. Returns how many were removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}
