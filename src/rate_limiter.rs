use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::RateLimitConfig;
use crate::utils::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by caller identity.
///
/// Expired windows are only dropped by [`RateLimiter::sweep_expired`], which
/// the host scheduler calls periodically.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Window>>,
}

/// Snapshot returned for each admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets; zero when no window is open.
    pub reset_in: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_window, Duration::from_secs(config.window_secs))
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Counts a request against `key` and reports whether it is admitted.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.check(key).allowed
    }

    /// Admission decision plus the header values describing the window.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let window = entries.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });
        if now > window.reset_at {
            *window = Window {
                count: 0,
                reset_at: now + self.window,
            };
        }

        let allowed = window.count < self.max_requests;
        if allowed {
            window.count += 1;
        }

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.count),
            reset_in: window.reset_at.saturating_duration_since(now),
        }
    }

    pub fn remaining(&self, key: &str) -> u32 {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(window) if now <= window.reset_at => self.max_requests.saturating_sub(window.count),
            _ => self.max_requests,
        }
    }

    /// When the caller's current window closes, or `None` if no window is open.
    pub fn reset_time(&self, key: &str) -> Option<Instant> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|window| now <= window.reset_at)
            .map(|window| window.reset_at)
    }

    /// Drops every window that has already reset. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, window| now <= window.reset_at);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept expired rate limit windows");
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
