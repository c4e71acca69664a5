//! Login rate limiting by source IP.
//!
//! §5's "on ≥ N failed attempts from the same IP within a window, further
//! attempts are blocked for a cooldown; successful login clears the IP" rule,
//! tracked in a plain `parking_lot`-guarded map the same way [`crate::session`]
//! tracks sessions.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::AdminError;

/// Failed attempts allowed within [`WINDOW_SECONDS`] before an IP is blocked.
const MAX_FAILED_ATTEMPTS: u32 = 5;
/// Width of the rolling window failed attempts are counted over.
const WINDOW_SECONDS: i64 = 300;
/// How long an IP stays blocked once it trips the limit.
const COOLDOWN_SECONDS: i64 = 300;

#[derive(Debug, Clone)]
struct Attempts {
    count: u32,
    window_started_at: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Tracks failed login attempts per source IP and enforces a cooldown.
#[derive(Debug, Default)]
pub struct LoginRateLimiter {
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl LoginRateLimiter {
    /// Create an empty rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `ip` is currently allowed to attempt a login.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::RateLimited`] if `ip` is within its cooldown.
    pub fn check(&self, ip: &str) -> Result<(), AdminError> {
        let attempts = self.attempts.lock();
        if let Some(entry) = attempts.get(ip) {
            if let Some(blocked_until) = entry.blocked_until {
                if Utc::now() < blocked_until {
                    return Err(AdminError::RateLimited);
                }
            }
        }
        Ok(())
    }

    /// Record a failed login attempt from `ip`, blocking it once the
    /// threshold is crossed within the rolling window.
    pub fn record_failure(&self, ip: &str) {
        let now = Utc::now();
        let mut attempts = self.attempts.lock();
        let entry = attempts.entry(ip.to_owned()).or_insert_with(|| Attempts {
            count: 0,
            window_started_at: now,
            blocked_until: None,
        });

        if now - entry.window_started_at > Duration::seconds(WINDOW_SECONDS) {
            entry.count = 0;
            entry.window_started_at = now;
            entry.blocked_until = None;
        }

        entry.count += 1;
        if entry.count >= MAX_FAILED_ATTEMPTS {
            entry.blocked_until = Some(now + Duration::seconds(COOLDOWN_SECONDS));
        }
    }

    /// Clear any record of failed attempts for `ip` after a successful login.
    pub fn record_success(&self, ip: &str) {
        self.attempts.lock().remove(ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_allow_first_attempt() {
        let limiter = LoginRateLimiter::new();
        assert!(limiter.check("1.2.3.4").is_ok());
    }

    #[test]
    fn test_should_block_after_threshold_failures() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            limiter.record_failure("1.2.3.4");
        }
        assert!(matches!(limiter.check("1.2.3.4"), Err(AdminError::RateLimited)));
    }

    #[test]
    fn test_should_not_block_below_threshold() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            limiter.record_failure("1.2.3.4");
        }
        assert!(limiter.check("1.2.3.4").is_ok());
    }

    #[test]
    fn test_should_clear_attempts_on_success() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            limiter.record_failure("1.2.3.4");
        }
        limiter.record_success("1.2.3.4");
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            limiter.record_failure("1.2.3.4");
        }
        assert!(limiter.check("1.2.3.4").is_ok());
    }

    #[test]
    fn test_should_track_ips_independently() {
        let limiter = LoginRateLimiter::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            limiter.record_failure("1.2.3.4");
        }
        assert!(limiter.check("5.6.7.8").is_ok());
    }
}
