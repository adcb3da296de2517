//! HTTP client for the protected downstream dependency.
//!
//! The middleware imposes no wire format: payloads travel as opaque JSON
//! values. The client's job is to classify transport and status failures
//! into the crate error taxonomy so the guards can act on them.

use crate::errors::{
    ConfigurationError, PermanentError, ProxyResult, TransientError,
};
use async_trait::async_trait;
use http::HeaderMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Default URL of the downstream service
pub const DEFAULT_DOWNSTREAM_URL: &str = "http://localhost:5001/external-api/process";

/// Default downstream request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// A callable downstream dependency
///
/// The orchestrator accepts any invocable; this trait is the typed seam for
/// swapping the HTTP client with a test double.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Send a payload to the dependency and return its response
    async fn call(&self, payload: &Value) -> ProxyResult<Value>;
}

/// Configuration for the downstream client
#[derive(Debug, Clone)]
pub struct DownstreamConfig {
    /// Base URL of the downstream service
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Headers attached to every request
    pub default_headers: HeaderMap,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            // The default URL is a compile-time constant and always parses
            base_url: Url::parse(DEFAULT_DOWNSTREAM_URL).expect("default URL is valid"),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            default_headers: HeaderMap::new(),
        }
    }
}

impl DownstreamConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: &str) -> Result<Self, ConfigurationError> {
        let base_url = Url::parse(base_url).map_err(|e| ConfigurationError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            base_url,
            ..Default::default()
        })
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every request
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<http::header::HeaderName>(),
            value.parse::<http::header::HeaderValue>(),
        ) {
            self.default_headers.insert(name, value);
        }
        self
    }
}

/// HTTP client for the downstream dependency
pub struct DownstreamClient {
    config: DownstreamConfig,
    http: reqwest::Client,
}

impl DownstreamClient {
    /// Create a new client from the given configuration
    pub fn new(config: DownstreamConfig) -> ProxyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers.clone())
            .build()
            .map_err(|e| ConfigurationError::HttpClient {
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    /// Make a POST request to the downstream service
    pub async fn post(&self, path: &str, payload: &Value) -> ProxyResult<Value> {
        let url = self.endpoint(path);
        debug!(%url, "calling downstream service");

        let response = self.http.post(url).json(payload).send().await?;
        Self::decode(response).await
    }

    /// Make a GET request to the downstream service
    pub async fn get(&self, path: &str) -> ProxyResult<Value> {
        let url = self.endpoint(path);
        debug!(%url, "calling downstream service");

        let response = self.http.get(url).send().await?;
        Self::decode(response).await
    }

    /// Get the client configuration
    pub fn config(&self) -> &DownstreamConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    async fn decode(response: reqwest::Response) -> ProxyResult<Value> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| {
                PermanentError::UnexpectedResponse {
                    message: e.to_string(),
                }
                .into()
            });
        }

        let retry_after = response
            .headers()
            .get(http::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        if status.as_u16() == 429 || status.is_server_error() {
            error!(status = status.as_u16(), "downstream returned retryable status");
            return Err(TransientError::ServiceUnavailable {
                status: status.as_u16(),
                retry_after,
            }
            .into());
        }

        let message = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "downstream rejected request");
        Err(PermanentError::Rejected {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

impl std::fmt::Debug for DownstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Downstream for DownstreamClient {
    async fn call(&self, payload: &Value) -> ProxyResult<Value> {
        self.post("", payload).await
    }
}
