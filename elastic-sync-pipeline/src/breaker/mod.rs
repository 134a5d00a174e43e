//! Consecutive-failure circuit breaker.
//!
//! Two states only: **Closed** (attempts proceed) and **Open** (attempts are
//! refused). The breaker trips after a configured number of back-to-back
//! failed bulk attempts and stays open until an explicit [`reset`]; there is
//! no timed half-open recovery. A persistently broken search engine fails
//! fast and visibly instead of silently accumulating retry traffic.
//!
//! [`reset`]: CircuitBreaker::reset

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, attempts proceed.
    Closed,
    /// Too many consecutive failures, attempts are refused.
    Open,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// Tracks consecutive failed bulk attempts and trips after the configured
/// tolerance is reached.
///
/// Safe for concurrent access from multiple producers (reading the state on
/// admission) and the single consumer worker (recording outcomes).
#[derive(Debug)]
pub struct CircuitBreaker {
    max_consecutive_errors: u32,
    consecutive_failures: AtomicU32,
    open: AtomicBool,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given consecutive-failure tolerance.
    pub fn new(max_consecutive_errors: u32) -> Self {
        debug_assert!(max_consecutive_errors > 0);
        Self {
            max_consecutive_errors,
            consecutive_failures: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    /// Record a successful bulk attempt, resetting the failure counter.
    ///
    /// Failures before a success never count toward a later trip.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a failed bulk attempt, returning the resulting state.
    pub fn record_failure(&self) -> BreakerState {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.max_consecutive_errors {
            self.open.store(true, Ordering::SeqCst);
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    /// Whether the breaker is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Current state.
    pub fn state(&self) -> BreakerState {
        if self.is_open() {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Explicitly close the breaker and clear the failure counter.
    ///
    /// The only path from Open back to Closed.
    pub fn reset(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_threshold() {
        let breaker = CircuitBreaker::new(3);

        assert_eq!(breaker.record_failure(), BreakerState::Closed);
        assert_eq!(breaker.record_failure(), BreakerState::Closed);
        assert!(!breaker.is_open());

        assert_eq!(breaker.record_failure(), BreakerState::Open);
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_resets_counter() {
        let breaker = CircuitBreaker::new(3);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);

        // A fresh run of failures is needed to trip.
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_open_requires_explicit_reset() {
        let breaker = CircuitBreaker::new(1);

        breaker.record_failure();
        assert!(breaker.is_open());

        // Success alone does not close an open breaker.
        breaker.record_success();
        assert!(breaker.is_open());

        breaker.reset();
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_state_display() {
        let breaker = CircuitBreaker::new(1);
        assert_eq!(breaker.state().to_string(), "closed");
        breaker.record_failure();
        assert_eq!(breaker.state().to_string(), "open");
    }
}
