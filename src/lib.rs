//! Resilience middleware for unreliable downstream services
//!
//! Production-ready, client-side protection for outbound calls:
//! - **Rate limiting**: per-identity admission control over a sliding window
//! - **Circuit breaking**: fail fast while the dependency is unhealthy
//! - **Retry**: bounded attempts with exponential backoff and jitter
//! - **Observability**: tracing and counter metrics throughout
//!
//! The guards compose in a fixed order — rate limiter, then circuit
//! breaker, then retry around the actual call — and the breaker records one
//! outcome per orchestrated call rather than one per attempt.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use resilient_proxy::ProxyError;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ProxyError> {
//!     let orchestrator = resilient_proxy::create_orchestrator_from_env()?;
//!     let client = resilient_proxy::create_downstream_client_from_env()?;
//!
//!     let payload = json!({ "question": "ping" });
//!     let response = orchestrator
//!         .execute("203.0.113.7", || client.post("", &payload))
//!         .await?;
//!
//!     println!("Downstream answered: {}", response);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// Core modules
pub mod config;
pub mod downstream;
pub mod errors;

// Resilience guards
pub mod resilience;

// Observability
pub mod observability;

// Testing utilities
pub mod mocks;

// Tests
#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use config::{ProxyConfig, ProxyConfigBuilder};
pub use downstream::{Downstream, DownstreamClient, DownstreamConfig};
pub use errors::{
    CircuitError, ConfigurationError, PermanentError, ProxyError, ProxyResult, RateLimitError,
    TransientError,
};
pub use observability::{MetricsCollector, MetricsSnapshot};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, DefaultClassifier, OrchestratorConfig,
    RateLimiter, RateLimiterConfig, ResilienceOrchestrator, RetryClassifier, RetryConfig,
    RetryExecutor, RetryOutcome,
};

pub use resilience::{create_orchestrator, create_orchestrator_with_config};

/// Create an orchestrator from environment variables
///
/// Reads the `RATE_LIMIT_*`, `CB_*`, and `RETRY_*` variables documented on
/// [`ProxyConfig::from_env`]; unset variables fall back to defaults.
pub fn create_orchestrator_from_env() -> ProxyResult<ResilienceOrchestrator> {
    let config = ProxyConfig::from_env()?;
    Ok(ResilienceOrchestrator::with_config(
        OrchestratorConfig::new()
            .rate_limiter(config.rate_limiter)
            .circuit_breaker(config.circuit_breaker)
            .retry(config.retry),
    ))
}

/// Create a downstream client from environment variables
///
/// Reads `EXTERNAL_SERVICE_URL` and `REQUEST_TIMEOUT`; unset variables fall
/// back to defaults.
pub fn create_downstream_client_from_env() -> ProxyResult<DownstreamClient> {
    let config = ProxyConfig::from_env()?;
    DownstreamClient::new(config.downstream)
}
