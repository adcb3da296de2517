//! Orchestrator composing the three resilience guards.
//!
//! Composition order is fixed and significant: the rate limiter gate is a
//! purely local check and runs first; the circuit breaker gate runs next so
//! no retry budget is spent on a known-bad dependency; the retry executor
//! wraps the actual downstream call. The breaker records the aggregate
//! outcome of the whole retry sequence, not each attempt, so it reacts to
//! sustained unavailability rather than to transient faults the retry
//! policy already absorbs.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::rate_limiter::{RateLimiter, RateLimiterConfig};
use super::retry::{DefaultClassifier, RetryClassifier, RetryConfig, RetryExecutor};
use crate::errors::{ProxyResult, RateLimitError};
use crate::observability::{MetricsCollector, MetricsSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Configuration for the resilience orchestrator
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Rate limiter configuration
    pub rate_limiter: RateLimiterConfig,
    /// Circuit breaker configuration
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl OrchestratorConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rate limiter configuration
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiter = config;
        self
    }

    /// Set the circuit breaker configuration
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Set the retry configuration
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }
}

/// Orchestrator applying rate limiting, circuit breaking, and retry to
/// every outbound call
pub struct ResilienceOrchestrator {
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    retry_executor: RetryExecutor,
    metrics: MetricsCollector,
}

impl ResilienceOrchestrator {
    /// Create a new orchestrator with default configuration
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            rate_limiter: RateLimiter::with_config(config.rate_limiter),
            circuit_breaker: CircuitBreaker::with_config(config.circuit_breaker),
            retry_executor: RetryExecutor::with_config(config.retry),
            metrics: MetricsCollector::new(),
        }
    }

    /// Execute a call for `identity` with all three guards applied
    pub async fn execute<F, Fut, T>(&self, identity: &str, call: F) -> ProxyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        self.execute_with(identity, &DefaultClassifier, call).await
    }

    /// Execute a call with a caller-supplied retry classifier
    ///
    /// A rejection at the rate limiter or circuit breaker short-circuits
    /// before the downstream call or the retry executor is touched.
    #[instrument(skip(self, classifier, call), fields(identity = %identity))]
    pub async fn execute_with<F, Fut, T>(
        &self,
        identity: &str,
        classifier: &dyn RetryClassifier,
        call: F,
    ) -> ProxyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        let call_id = Uuid::new_v4();
        self.metrics.record_call();

        if !self.rate_limiter.admit(identity) {
            self.metrics.record_rate_limit_denial();
            let reset_in = self.rate_limiter.reset_in(identity);
            warn!(
                %call_id,
                reset_in_ms = reset_in.as_millis() as u64,
                "call rejected by rate limiter"
            );
            return Err(RateLimitError::Exceeded {
                limit: self.rate_limiter.config().max_requests,
                reset_in,
            }
            .into());
        }

        if let Err(open) = self.circuit_breaker.try_acquire() {
            self.metrics.record_circuit_rejection();
            warn!(%call_id, "call rejected by open circuit");
            return Err(open.into());
        }

        debug!(%call_id, "dispatching downstream call");
        let outcome = self.retry_executor.run_with_outcome(classifier, call).await;
        self.metrics
            .record_retries(outcome.attempts.saturating_sub(1) as u64);

        // One breaker event per orchestrated call; permanent rejections mean
        // the dependency responded and leave the breaker untouched.
        match &outcome.result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(error) if error.trips_breaker() => {
                self.metrics.record_failed_call();
                self.circuit_breaker.record_failure();
            }
            Err(_) => self.metrics.record_failed_call(),
        }

        debug!(
            %call_id,
            attempts = outcome.attempts,
            succeeded = outcome.succeeded(),
            "downstream call settled"
        );
        outcome.result
    }

    /// Get the number of requests `identity` may still make in the current window
    pub fn remaining(&self, identity: &str) -> u32 {
        self.rate_limiter.remaining(identity)
    }

    /// Get the time until `identity`'s rate limit window resets
    pub fn reset_in(&self, identity: &str) -> Duration {
        self.rate_limiter.reset_in(identity)
    }

    /// Remove rate limiter identities inactive for longer than `max_age`
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        self.rate_limiter.evict_stale(max_age)
    }

    /// Get the current circuit breaker state
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Reset the circuit breaker to closed
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    /// Get the rate limiter guard
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Get the circuit breaker guard
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Get the retry executor
    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry_executor
    }

    /// Get a point-in-time metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orchestrated_calls: self.metrics.orchestrated_calls(),
            rate_limit_denials: self.metrics.rate_limit_denials(),
            circuit_rejections: self.metrics.circuit_rejections(),
            retries_performed: self.metrics.retries_performed(),
            failed_calls: self.metrics.failed_calls(),
            circuit_state: self.circuit_breaker.state(),
            circuit_failure_rate: self.circuit_breaker.failure_rate(),
            tracked_identities: self.rate_limiter.tracked_identities(),
        }
    }
}

impl Default for ResilienceOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResilienceOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceOrchestrator")
            .field("rate_limiter", &self.rate_limiter)
            .field("circuit_state", &self.circuit_state())
            .finish_non_exhaustive()
    }
}

/// Create a shared orchestrator with default configuration
pub fn create_orchestrator() -> Arc<ResilienceOrchestrator> {
    Arc::new(ResilienceOrchestrator::new())
}

/// Create a shared orchestrator with custom configuration
pub fn create_orchestrator_with_config(config: OrchestratorConfig) -> Arc<ResilienceOrchestrator> {
    Arc::new(ResilienceOrchestrator::with_config(config))
}
