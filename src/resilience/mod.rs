//! Resilience guards for calls to an unreliable downstream dependency.
//!
//! Three cooperating guards, applied in order by the orchestrator:
//! per-identity admission control (sliding window rate limiting), failure
//! isolation (circuit breaking), and transient-fault recovery (retry with
//! exponential backoff and jitter).

pub mod circuit_breaker;
pub mod orchestrator;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use orchestrator::{
    create_orchestrator, create_orchestrator_with_config, OrchestratorConfig,
    ResilienceOrchestrator,
};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{
    DefaultClassifier, RetryClassifier, RetryConfig, RetryExecutor, RetryOutcome,
};
