//! Configuration management for the resilience middleware.
//!
//! Supports configuration via:
//! - Explicit values
//! - Environment variables
//! - Builder pattern
//!
//! Configuration is consumed at construction time and never re-read.

use crate::downstream::DownstreamConfig;
use crate::errors::{ConfigurationError, ProxyResult};
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use std::time::Duration;
use url::Url;

/// Complete configuration for the middleware
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Rate limiter settings
    pub rate_limiter: RateLimiterConfig,
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,
    /// Retry settings
    pub retry: RetryConfig,
    /// Downstream client settings
    pub downstream: DownstreamConfig,
}

impl ProxyConfig {
    /// Create a new configuration builder
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::new()
    }

    /// Create configuration from environment variables
    ///
    /// Reads:
    /// - `RATE_LIMIT_WINDOW_SECONDS`, `RATE_LIMIT_MAX_REQUESTS`
    /// - `CB_FAILURE_THRESHOLD`, `CB_RESET_TIMEOUT_SECONDS`, `CB_SUCCESS_THRESHOLD`
    /// - `RETRY_MAX_ATTEMPTS`, `RETRY_INITIAL_DELAY_MS`, `RETRY_BACKOFF_MULTIPLIER`,
    ///   `RETRY_MAX_DELAY_MS`
    /// - `EXTERNAL_SERVICE_URL`, `REQUEST_TIMEOUT` (seconds)
    ///
    /// Unset variables fall back to defaults; present but unparseable values
    /// are configuration errors.
    pub fn from_env() -> ProxyResult<Self> {
        let mut config = Self::default();

        if let Some(secs) = env_u64("RATE_LIMIT_WINDOW_SECONDS")? {
            config.rate_limiter.window = Duration::from_secs(secs);
        }
        if let Some(n) = env_u32("RATE_LIMIT_MAX_REQUESTS")? {
            config.rate_limiter.max_requests = n;
        }

        if let Some(n) = env_u32("CB_FAILURE_THRESHOLD")? {
            config.circuit_breaker.failure_threshold = n;
        }
        if let Some(secs) = env_u64("CB_RESET_TIMEOUT_SECONDS")? {
            config.circuit_breaker.reset_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_u32("CB_SUCCESS_THRESHOLD")? {
            config.circuit_breaker.success_threshold = n;
        }

        if let Some(n) = env_u32("RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = env_u64("RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(m) = env_f64("RETRY_BACKOFF_MULTIPLIER")? {
            config.retry.multiplier = m;
        }
        if let Some(ms) = env_u64("RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }

        if let Ok(url) = std::env::var("EXTERNAL_SERVICE_URL") {
            config.downstream.base_url =
                Url::parse(&url).map_err(|e| ConfigurationError::InvalidUrl {
                    url,
                    message: e.to_string(),
                })?;
        }
        if let Some(secs) = env_u64("REQUEST_TIMEOUT")? {
            config.downstream.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ProxyResult<()> {
        if self.rate_limiter.window.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                name: "RATE_LIMIT_WINDOW_SECONDS",
                message: "window must be greater than zero".to_string(),
            }
            .into());
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "CB_FAILURE_THRESHOLD",
                message: "failure threshold must be at least 1".to_string(),
            }
            .into());
        }
        if self.circuit_breaker.success_threshold == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "CB_SUCCESS_THRESHOLD",
                message: "success threshold must be at least 1".to_string(),
            }
            .into());
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                name: "RETRY_MAX_ATTEMPTS",
                message: "attempt budget must be at least 1".to_string(),
            }
            .into());
        }
        if self.retry.initial_delay.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                name: "RETRY_INITIAL_DELAY_MS",
                message: "initial delay must be greater than zero".to_string(),
            }
            .into());
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigurationError::InvalidValue {
                name: "RETRY_BACKOFF_MULTIPLIER",
                message: "multiplier must be at least 1.0".to_string(),
            }
            .into());
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(ConfigurationError::InvalidValue {
                name: "RETRY_MAX_DELAY_MS",
                message: "maximum delay must not be below the initial delay".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Builder for [`ProxyConfig`]
#[derive(Debug, Default)]
pub struct ProxyConfigBuilder {
    config: ProxyConfig,
}

impl ProxyConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: ProxyConfig::default(),
        }
    }

    /// Set the rate limiter configuration
    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limiter = config;
        self
    }

    /// Set the circuit breaker configuration
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Set the retry configuration
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Set the downstream client configuration
    pub fn downstream(mut self, config: DownstreamConfig) -> Self {
        self.config.downstream = config;
        self
    }

    /// Build the configuration, validating it
    pub fn build(self) -> ProxyResult<ProxyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation (for testing)
    pub fn build_unchecked(self) -> ProxyConfig {
        self.config
    }
}

fn env_u32(name: &'static str) -> Result<Option<u32>, ConfigurationError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidValue {
                name,
                message: format!("expected an integer, got {value:?}"),
            }),
        Err(_) => Ok(None),
    }
}

fn env_u64(name: &'static str) -> Result<Option<u64>, ConfigurationError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidValue {
                name,
                message: format!("expected an integer, got {value:?}"),
            }),
        Err(_) => Ok(None),
    }
}

fn env_f64(name: &'static str) -> Result<Option<f64>, ConfigurationError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigurationError::InvalidValue {
                name,
                message: format!("expected a number, got {value:?}"),
            }),
        Err(_) => Ok(None),
    }
}
