//! Retry logic for origin fetches.
//!
//! # Responsibilities
//! - Determine if an origin fetch is retryable (idempotent methods only)
//! - Enforce retry budget (retries as a fraction of total requests)
//!
//! # Design Decisions
//! - Never retry anything but GET/HEAD/OPTIONS
//! - Connection errors always retryable; only 502/503/504 statuses are
//! - Edge function failures are never retried (they are not origin calls)

use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{Method, StatusCode};

/// Caps retries at `reserve + ratio * requests`.
#[derive(Debug)]
pub struct RetryBudget {
    ratio: f32,
    reserve: u64,
    requests: AtomicU64,
    retries: AtomicU64,
}

impl RetryBudget {
    pub fn new(ratio: f32, reserve: u64) -> Self {
        Self {
            ratio,
            reserve,
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    /// Count an incoming request toward the budget.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Try to spend one retry. Returns false when the budget is exhausted.
    pub fn can_retry(&self) -> bool {
        let requests = self.requests.load(Ordering::Relaxed);
        let allowed = self.reserve + (requests as f64 * f64::from(self.ratio)) as u64;

        let spent = self.retries.fetch_add(1, Ordering::Relaxed);
        if spent < allowed {
            true
        } else {
            self.retries.fetch_sub(1, Ordering::Relaxed);
            false
        }
    }

    pub fn retries_spent(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

/// Whether an attempt that ended with `status` (or a network error) may be retried.
pub fn is_retryable(method: &Method, status: Option<StatusCode>, network_error: bool) -> bool {
    if !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return false;
    }
    if network_error {
        return true;
    }
    matches!(
        status,
        Some(StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(&Method::GET, Some(StatusCode::SERVICE_UNAVAILABLE), false));
        assert!(is_retryable(&Method::HEAD, None, true));
        assert!(!is_retryable(&Method::GET, Some(StatusCode::NOT_FOUND), false));
        assert!(!is_retryable(&Method::GET, Some(StatusCode::INTERNAL_SERVER_ERROR), false));
        assert!(!is_retryable(&Method::POST, None, true));
    }

    #[test]
    fn test_budget_reserve_then_ratio() {
        let budget = RetryBudget::new(0.5, 1);
        assert!(budget.can_retry());
        assert!(!budget.can_retry());

        budget.record_request();
        budget.record_request();
        // reserve 1 + 2 * 0.5 = 2 allowed in total
        assert!(budget.can_retry());
        assert!(!budget.can_retry());
        assert_eq!(budget.retries_spent(), 2);
    }
}
