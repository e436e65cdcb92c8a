//! Per-domain admission control.
//!
//! A sliding-window counter keyed by domain: at most `max_per_window`
//! admissions per domain within `window`. State is local to the process;
//! running several claimers multiplies the effective budget, so a deployment
//! that needs a global cap runs a single logical scheduler.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::config::RateLimitSettings;

/// Sliding-window rate limiter over page domains.
pub struct DomainRateLimiter {
    max_per_window: u32,
    window: Duration,
    hits: HashMap<String, VecDeque<Instant>>,
}

impl DomainRateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            max_per_window: settings.max_per_window,
            window: settings.window(),
            hits: HashMap::new(),
        }
    }

    /// Decide admission for one candidate. Admitted candidates consume
    /// budget; rejected ones do not.
    pub fn admit(&mut self, domain: &str, now: Instant) -> bool {
        let hits = self.hits.entry(domain.to_string()).or_default();
        while let Some(&oldest) = hits.front() {
            if now.duration_since(oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.max_per_window as usize {
            return false;
        }

        hits.push_back(now);
        true
    }

    /// Drop domains whose entire window has expired, bounding memory over
    /// long runs.
    pub fn evict_idle(&mut self, now: Instant) {
        let window = self.window;
        self.hits.retain(|_, hits| {
            hits.back()
                .is_some_and(|&last| now.duration_since(last) < window)
        });
    }

    /// Number of domains currently tracked.
    pub fn tracked_domains(&self) -> usize {
        self.hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_seconds: u64) -> DomainRateLimiter {
        DomainRateLimiter::new(&RateLimitSettings {
            max_per_window: max,
            window_seconds,
        })
    }

    #[test]
    fn admits_up_to_budget_then_rejects() {
        let mut limiter = limiter(2, 60);
        let now = Instant::now();

        assert!(limiter.admit("example.com", now));
        assert!(limiter.admit("example.com", now));
        assert!(!limiter.admit("example.com", now));
    }

    #[test]
    fn domains_have_independent_budgets() {
        let mut limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.admit("a.example", now));
        assert!(limiter.admit("b.example", now));
        assert!(!limiter.admit("a.example", now));
    }

    #[test]
    fn budget_recovers_after_the_window() {
        let mut limiter = limiter(1, 5);
        let start = Instant::now();

        assert!(limiter.admit("example.com", start));
        assert!(!limiter.admit("example.com", start + Duration::from_secs(4)));
        assert!(limiter.admit("example.com", start + Duration::from_secs(5)));
    }

    #[test]
    fn rejections_do_not_consume_budget() {
        let mut limiter = limiter(1, 10);
        let start = Instant::now();

        assert!(limiter.admit("example.com", start));
        // Rejected attempts inside the window must not extend it.
        assert!(!limiter.admit("example.com", start + Duration::from_secs(9)));
        assert!(limiter.admit("example.com", start + Duration::from_secs(10)));
    }

    #[test]
    fn idle_domains_are_evicted() {
        let mut limiter = limiter(1, 5);
        let start = Instant::now();

        limiter.admit("a.example", start);
        limiter.admit("b.example", start + Duration::from_secs(4));
        limiter.evict_idle(start + Duration::from_secs(6));

        assert_eq!(limiter.tracked_domains(), 1);
    }
}
