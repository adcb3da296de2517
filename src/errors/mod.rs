//! Error types for the resilience middleware.
//!
//! Provides a tagged error hierarchy so callers can branch on the kind of
//! failure (rejected locally vs. failed downstream, retryable vs. not)
//! without string matching.

use std::time::Duration;
use thiserror::Error;

/// Result type for middleware operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Root error type for the resilience middleware
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Request rejected by the rate limiter
    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Request rejected by the circuit breaker
    #[error("Circuit breaker error: {0}")]
    Circuit(#[from] CircuitError),

    /// Transient downstream failure (worth retrying)
    #[error("Transient downstream error: {0}")]
    Transient(#[from] TransientError),

    /// Permanent downstream failure (the dependency responded; retrying will not help)
    #[error("Permanent downstream error: {0}")]
    Permanent(#[from] PermanentError),
}

impl ProxyError {
    /// Get a stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "PROXY_CONFIG",
            Self::RateLimit(_) => "PROXY_RATE_LIMIT",
            Self::Circuit(_) => "PROXY_CIRCUIT_OPEN",
            Self::Transient(_) => "PROXY_TRANSIENT",
            Self::Permanent(_) => "PROXY_PERMANENT",
        }
    }

    /// Check if this error is retryable
    ///
    /// Rate limit and circuit rejections are decided locally and are not
    /// retryable; only transient downstream failures are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Check if this error should count against the circuit breaker
    ///
    /// Permanent rejections mean the dependency responded, so they do not
    /// indicate unavailability.
    pub fn trips_breaker(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Get a "try again after" duration if applicable
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(RateLimitError::Exceeded { reset_in, .. }) => Some(*reset_in),
            Self::Circuit(CircuitError::Open { retry_in }) => Some(*retry_in),
            Self::Transient(TransientError::ServiceUnavailable { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// Get the HTTP status code this error maps to, if applicable
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::RateLimit(_) => Some(429),
            Self::Circuit(_) => Some(503),
            Self::Transient(TransientError::Timeout) => Some(504),
            Self::Transient(TransientError::ConnectionFailed { .. }) => Some(502),
            Self::Transient(TransientError::ServiceUnavailable { status, .. }) => Some(*status),
            Self::Transient(TransientError::Http(_)) => Some(502),
            Self::Permanent(PermanentError::Rejected { status, .. }) => Some(*status),
            Self::Permanent(PermanentError::UnexpectedResponse { .. }) => Some(502),
            Self::Configuration(_) => None,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A configuration value failed validation
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Name of the offending setting or environment variable
        name: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// The downstream base URL could not be parsed
    #[error("Invalid downstream URL {url:?}: {message}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parser error detail
        message: String,
    },

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {message}")]
    HttpClient {
        /// Builder error detail
        message: String,
    },
}

/// Rate limiter rejections
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// The identity is over capacity for the current window
    #[error("Rate limit of {limit} requests exceeded, retry in {reset_in:?}")]
    Exceeded {
        /// Configured window capacity
        limit: u32,
        /// Time until the oldest counted request leaves the window
        reset_in: Duration,
    },
}

/// Circuit breaker rejections
#[derive(Error, Debug)]
pub enum CircuitError {
    /// The circuit is open and the cooldown has not elapsed
    #[error("Circuit breaker is open, retry in {retry_in:?}")]
    Open {
        /// Remaining cooldown before a probe will be allowed
        retry_in: Duration,
    },
}

/// Transient downstream failures
#[derive(Error, Debug)]
pub enum TransientError {
    /// The downstream call timed out
    #[error("Request timed out")]
    Timeout,

    /// The connection could not be established
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message
        message: String,
    },

    /// The dependency answered with a retryable status (5xx or 429)
    #[error("Service unavailable (status {status})")]
    ServiceUnavailable {
        /// HTTP status returned by the dependency
        status: u16,
        /// Retry-After hint from the response, if present
        retry_after: Option<Duration>,
    },

    /// Other transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Permanent downstream failures
#[derive(Error, Debug)]
pub enum PermanentError {
    /// The dependency rejected the request (client-side 4xx)
    #[error("Rejected by downstream (status {status}): {message}")]
    Rejected {
        /// HTTP status returned by the dependency
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// The response could not be interpreted
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Error message
        message: String,
    },
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Transient(TransientError::Timeout)
        } else if err.is_connect() {
            ProxyError::Transient(TransientError::ConnectionFailed {
                message: err.to_string(),
            })
        } else if err.is_decode() {
            ProxyError::Permanent(PermanentError::UnexpectedResponse {
                message: err.to_string(),
            })
        } else {
            ProxyError::Transient(TransientError::Http(err.to_string()))
        }
    }
}
