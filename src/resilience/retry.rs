//! Retry with exponential backoff and jitter for transient failures.

use crate::errors::{ProxyError, ProxyResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first try (must be >= 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Cap applied to the backoff before jitter
    pub max_delay: Duration,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total attempt budget
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn multiplier(mut self, m: f64) -> Self {
        self.multiplier = m;
        self
    }

    /// Set the maximum delay
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Create a configuration that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculate the delay before a given retry, numbered from 1
    ///
    /// The exponential term is capped at `max_delay`; when jitter is on, a
    /// uniform addition in `[0, delay/2]` goes on top of the capped value so
    /// simultaneous clients decorrelate even at the cap.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.multiplier.powi(retry.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            capped + rand_jitter() * (capped / 2.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }
}

// Simple pseudo-random jitter (0.0 to 1.0). An LCG over the clock is enough
// for delay decorrelation.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % 1000) as f64 / 1000.0
}

/// Classifier deciding which errors are worth retrying
///
/// Retryability is supplied by the caller rather than guessed from an
/// assumed error taxonomy.
pub trait RetryClassifier: Send + Sync {
    /// Check if an error is retryable
    fn is_retryable(&self, error: &ProxyError) -> bool;

    /// Get a delay hint for an error, overriding the calculated backoff
    fn retry_delay_hint(&self, error: &ProxyError) -> Option<Duration> {
        let _ = error;
        None
    }
}

/// Default classifier following the crate error taxonomy
#[derive(Debug, Clone, Default)]
pub struct DefaultClassifier;

impl RetryClassifier for DefaultClassifier {
    fn is_retryable(&self, error: &ProxyError) -> bool {
        error.is_retryable()
    }

    fn retry_delay_hint(&self, error: &ProxyError) -> Option<Duration> {
        error.retry_after()
    }
}

/// Outcome of a retried call sequence
///
/// Carries the attempt count alongside the final result so the caller can
/// record the aggregate outcome (one event for the whole sequence).
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Final result after the last attempt
    pub result: ProxyResult<T>,
    /// Number of attempts consumed, including the first try
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    /// Check whether the sequence ended in success
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Unwrap into the final result, discarding the attempt count
    pub fn into_result(self) -> ProxyResult<T> {
        self.result
    }
}

/// Executor wrapping a single downstream invocation with bounded retries
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new executor with default configuration
    pub fn new() -> Self {
        Self::with_config(RetryConfig::default())
    }

    /// Create a new executor with custom configuration
    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a call with retry logic, surfacing only the final result
    pub async fn run<F, Fut, T>(
        &self,
        classifier: &dyn RetryClassifier,
        call: F,
    ) -> ProxyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        self.run_with_outcome(classifier, call).await.into_result()
    }

    /// Execute a call with retry logic, reporting the attempts consumed
    ///
    /// A non-retryable error aborts immediately without consuming further
    /// attempts; exhaustion surfaces the last error unchanged. The
    /// inter-attempt suspension is per-task, so one caller's backoff never
    /// blocks another's progress, and dropping the returned future stops
    /// the sequence.
    pub async fn run_with_outcome<F, Fut, T>(
        &self,
        classifier: &dyn RetryClassifier,
        call: F,
    ) -> RetryOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ProxyResult<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "call succeeded after retry");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    if !classifier.is_retryable(&error) {
                        debug!(attempt, error = %error, "error not retryable, aborting");
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt,
                        };
                    }

                    if attempt >= self.config.max_attempts {
                        warn!(
                            attempt,
                            max_attempts = self.config.max_attempts,
                            error = %error,
                            "retry budget exhausted"
                        );
                        return RetryOutcome {
                            result: Err(error),
                            attempts: attempt,
                        };
                    }

                    let delay = classifier
                        .retry_delay_hint(&error)
                        .unwrap_or_else(|| self.config.delay_for_retry(attempt));

                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after backoff"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PermanentError, TransientError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use test_case::test_case;

    fn transient() -> ProxyError {
        ProxyError::Transient(TransientError::Timeout)
    }

    fn permanent() -> ProxyError {
        ProxyError::Permanent(PermanentError::Rejected {
            status: 400,
            message: "bad request".to_string(),
        })
    }

    #[test_case(1, 100; "first retry uses initial delay")]
    #[test_case(2, 200; "second retry doubles")]
    #[test_case(3, 400; "third retry doubles again")]
    fn test_delay_progression(retry: u32, expected_ms: u64) {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .jitter(false);

        assert_eq!(
            config.delay_for_retry(retry),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5))
            .multiplier(10.0)
            .jitter(false);

        assert_eq!(config.delay_for_retry(6), Duration::from_secs(5));
    }

    #[test]
    fn test_multiplier_one_is_constant() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(250))
            .multiplier(1.0)
            .jitter(false);

        assert_eq!(config.delay_for_retry(1), Duration::from_millis(250));
        assert_eq!(config.delay_for_retry(5), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(200))
            .multiplier(1.0)
            .jitter(true);

        for _ in 0..50 {
            let delay = config.delay_for_retry(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_jitter_applies_on_top_of_cap() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(100))
            .multiplier(4.0)
            .jitter(true);

        for _ in 0..50 {
            let delay = config.delay_for_retry(5);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new();
        let outcome = executor
            .run_with_outcome(&DefaultClassifier, || async { Ok(42) })
            .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_reports_attempts_after_transient_failures() {
        let executor = RetryExecutor::with_config(
            RetryConfig::new()
                .max_attempts(5)
                .initial_delay(Duration::from_millis(1))
                .jitter(false),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome = executor
            .run_with_outcome(&DefaultClassifier, || {
                let calls = calls_clone.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(transient())
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "recovered");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_last_error() {
        let executor = RetryExecutor::with_config(
            RetryConfig::new()
                .max_attempts(3)
                .initial_delay(Duration::from_millis(1))
                .jitter(false),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome: RetryOutcome<()> = executor
            .run_with_outcome(&DefaultClassifier, || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        assert!(matches!(
            outcome.result,
            Err(ProxyError::Transient(TransientError::Timeout))
        ));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_aborts_immediately() {
        let executor = RetryExecutor::with_config(RetryConfig::new().max_attempts(5));

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome: RetryOutcome<()> = executor
            .run_with_outcome(&DefaultClassifier, || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(permanent())
                }
            })
            .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_budget_never_retries() {
        let executor = RetryExecutor::with_config(RetryConfig::no_retry());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let outcome: RetryOutcome<()> = executor
            .run_with_outcome(&DefaultClassifier, || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classifier_delay_hint_overrides_backoff() {
        struct HintedClassifier;

        impl RetryClassifier for HintedClassifier {
            fn is_retryable(&self, error: &ProxyError) -> bool {
                error.is_retryable()
            }

            fn retry_delay_hint(&self, _error: &ProxyError) -> Option<Duration> {
                Some(Duration::from_millis(1))
            }
        }

        let executor = RetryExecutor::with_config(
            // Without the hint this would sleep for seconds
            RetryConfig::new()
                .max_attempts(2)
                .initial_delay(Duration::from_secs(30)),
        );

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let start = std::time::Instant::now();
        let outcome: RetryOutcome<()> = executor
            .run_with_outcome(&HintedClassifier, || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            })
            .await;

        assert_eq!(outcome.attempts, 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
