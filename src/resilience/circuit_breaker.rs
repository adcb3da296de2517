//! Circuit breaker pattern for failure isolation.
//!
//! The breaker fails fast while the downstream dependency is known to be
//! unhealthy, then probes for recovery through a limited probation phase.

use crate::errors::{CircuitError, ProxyResult};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through and failures are counted
    Closed,
    /// Circuit is open, calls are rejected without touching the dependency
    Open,
    /// Circuit is half-open, probing whether the dependency recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for the circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Number of successes in half-open required to close the circuit
    pub success_threshold: u32,
    /// How long to stay open before allowing a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Set the success threshold
    pub fn success_threshold(mut self, n: u32) -> Self {
        self.success_threshold = n;
        self
    }

    /// Set the reset timeout
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

// All fields guarded by one lock; transitions are atomic with respect to the
// counters they reset.
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

/// Circuit breaker guarding a single downstream dependency
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    // Metrics
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default configuration
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom configuration
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    /// Get the current circuit state
    ///
    /// Purely informational: the open-to-half-open transition happens when a
    /// call is attempted after the cooldown, not on state reads.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Ask permission to make a call
    ///
    /// Performs the lazy open-to-half-open transition when the cooldown has
    /// elapsed. Returns the remaining cooldown as a rejection otherwise.
    pub fn try_acquire(&self) -> Result<(), CircuitError> {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed < self.config.reset_timeout => {
                        drop(state);
                        self.total_rejections.fetch_add(1, Ordering::Relaxed);
                        Err(CircuitError::Open {
                            retry_in: self.config.reset_timeout - elapsed,
                        })
                    }
                    _ => {
                        info!("circuit breaker transitioning to half-open");
                        state.state = CircuitState::HalfOpen;
                        state.failure_count = 0;
                        state.success_count = 0;
                        Ok(())
                    }
                }
            }
        }
    }

    /// Execute a single call through the circuit breaker
    ///
    /// Fails fast with [`CircuitError::Open`] while the cooldown has not
    /// elapsed; otherwise runs the call and feeds its outcome into the
    /// transition table before returning it.
    pub async fn execute<F, Fut, T>(&self, call: F) -> ProxyResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.try_acquire()?;

        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if error.trips_breaker() {
                    self.record_failure();
                }
                Err(error)
            }
        }
    }

    /// Record a successful outcome
    pub fn record_success(&self) {
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;
                debug!(
                    success_count = state.success_count,
                    threshold = self.config.success_threshold,
                    "circuit breaker probe succeeded"
                );

                if state.success_count >= self.config.success_threshold {
                    info!("circuit breaker transitioning to closed");
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Open => {
                // A concurrent failure reopened the circuit while this call
                // was in flight; its success carries no probation credit.
                debug!("success recorded while circuit is open, ignoring");
            }
        }
    }

    /// Record a failed outcome
    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;

                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        failure_count = state.failure_count,
                        "circuit breaker transitioning to open"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                // No partial credit: probation calls must prove sustained
                // recovery, so a single failure reopens immediately.
                warn!("circuit breaker reopening from half-open");
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Force the circuit back to closed with both counters zeroed
    ///
    /// Operator escape hatch, not part of the normal transition logic.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.opened_at = None;
        info!("circuit breaker manually reset to closed");
    }

    /// Get the current consecutive failure count
    pub fn failure_count(&self) -> u32 {
        self.state.lock().failure_count
    }

    /// Get the current probation success count
    pub fn success_count(&self) -> u32 {
        self.state.lock().success_count
    }

    /// Get the total number of calls made through [`execute`](Self::execute)
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    /// Get the total number of recorded failures
    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    /// Get the total number of fail-fast rejections
    pub fn total_rejections(&self) -> u64 {
        self.total_rejections.load(Ordering::Relaxed)
    }

    /// Get the observed failure rate (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_calls.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_failures.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Get the circuit breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("total_calls", &self.total_calls())
            .field("total_failures", &self.total_failures())
            .field("total_rejections", &self.total_rejections())
            .finish()
    }
}
