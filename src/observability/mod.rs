//! Metrics collection for the resilience middleware.
//!
//! Counters only; exporting them (HTTP endpoint, push gateway) is the
//! embedding application's concern.

use crate::resilience::circuit_breaker::CircuitState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for orchestrated calls
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Calls submitted to the orchestrator
    orchestrated_calls: AtomicU64,
    /// Calls denied by the rate limiter
    rate_limit_denials: AtomicU64,
    /// Calls rejected by the open circuit
    circuit_rejections: AtomicU64,
    /// Retries performed (attempts beyond the first, across all calls)
    retries_performed: AtomicU64,
    /// Calls whose final outcome was a failure
    failed_calls: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call entering the orchestrator
    pub fn record_call(&self) {
        self.orchestrated_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate limiter denial
    pub fn record_rate_limit_denial(&self) {
        self.rate_limit_denials.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a circuit breaker rejection
    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record retries performed for one call
    pub fn record_retries(&self, retries: u64) {
        if retries > 0 {
            self.retries_performed.fetch_add(retries, Ordering::Relaxed);
        }
    }

    /// Record a call whose final outcome was a failure
    pub fn record_failed_call(&self) {
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of orchestrated calls
    pub fn orchestrated_calls(&self) -> u64 {
        self.orchestrated_calls.load(Ordering::Relaxed)
    }

    /// Get the number of rate limiter denials
    pub fn rate_limit_denials(&self) -> u64 {
        self.rate_limit_denials.load(Ordering::Relaxed)
    }

    /// Get the number of circuit breaker rejections
    pub fn circuit_rejections(&self) -> u64 {
        self.circuit_rejections.load(Ordering::Relaxed)
    }

    /// Get the number of retries performed
    pub fn retries_performed(&self) -> u64 {
        self.retries_performed.load(Ordering::Relaxed)
    }

    /// Get the number of failed calls
    pub fn failed_calls(&self) -> u64 {
        self.failed_calls.load(Ordering::Relaxed)
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.orchestrated_calls.store(0, Ordering::Relaxed);
        self.rate_limit_denials.store(0, Ordering::Relaxed);
        self.circuit_rejections.store(0, Ordering::Relaxed);
        self.retries_performed.store(0, Ordering::Relaxed);
        self.failed_calls.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the middleware, suitable for a health endpoint
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Calls submitted to the orchestrator
    pub orchestrated_calls: u64,
    /// Calls denied by the rate limiter
    pub rate_limit_denials: u64,
    /// Calls rejected by the open circuit
    pub circuit_rejections: u64,
    /// Retries performed across all calls
    pub retries_performed: u64,
    /// Calls whose final outcome was a failure
    pub failed_calls: u64,
    /// Current circuit breaker state
    pub circuit_state: CircuitState,
    /// Observed circuit breaker failure rate (0.0 to 1.0)
    pub circuit_failure_rate: f64,
    /// Identities currently tracked by the rate limiter
    pub tracked_identities: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = MetricsCollector::new();

        metrics.record_call();
        metrics.record_call();
        metrics.record_rate_limit_denial();
        metrics.record_retries(2);
        metrics.record_retries(0);
        metrics.record_failed_call();

        assert_eq!(metrics.orchestrated_calls(), 2);
        assert_eq!(metrics.rate_limit_denials(), 1);
        assert_eq!(metrics.circuit_rejections(), 0);
        assert_eq!(metrics.retries_performed(), 2);
        assert_eq!(metrics.failed_calls(), 1);
    }

    #[test]
    fn test_reset() {
        let metrics = MetricsCollector::new();

        metrics.record_call();
        metrics.record_failed_call();
        metrics.reset();

        assert_eq!(metrics.orchestrated_calls(), 0);
        assert_eq!(metrics.failed_calls(), 0);
    }
}
