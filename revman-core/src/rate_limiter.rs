//! Per-provider rate limiter (§4.2).
//!
//! Tracks the earliest instant each provider may be called again. A 429
//! response's `Retry-After` (or the default backoff) pushes that instant
//! forward; callers short-circuit instead of dispatching a doomed call.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Shared across concurrent provider calls within one run.
#[derive(Debug, Default)]
pub struct RateLimiter {
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `provider` may be called right now.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let guard = self.next_allowed.lock().expect("rate limiter mutex poisoned");
        match guard.get(provider) {
            Some(instant) => Instant::now() >= *instant,
            None => true,
        }
    }

    /// Records that `provider` must not be called again for `backoff`.
    pub fn mark_limited(&self, provider: &str, backoff: Duration) {
        let mut guard = self.next_allowed.lock().expect("rate limiter mutex poisoned");
        guard.insert(provider.to_string(), Instant::now() + backoff);
    }

    /// Clears any backoff recorded for `provider` (e.g. after a success).
    pub fn clear(&self, provider: &str) {
        let mut guard = self.next_allowed.lock().expect("rate limiter mutex poisoned");
        guard.remove(provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_unseen_provider() {
        let limiter = RateLimiter::new();
        assert!(limiter.is_allowed("openai"));
    }

    #[test]
    fn blocks_until_backoff_elapses() {
        let limiter = RateLimiter::new();
        limiter.mark_limited("openai", Duration::from_millis(50));
        assert!(!limiter.is_allowed("openai"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.is_allowed("openai"));
    }

    #[test]
    fn clear_lifts_backoff_immediately() {
        let limiter = RateLimiter::new();
        limiter.mark_limited("openai", Duration::from_secs(60));
        limiter.clear("openai");
        assert!(limiter.is_allowed("openai"));
    }
}
