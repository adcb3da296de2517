//! Resilience guard behavior across module boundaries.

use crate::errors::{ProxyError, TransientError};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, RateLimiter, RateLimiterConfig,
    RetryConfig,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn transient() -> ProxyError {
    ProxyError::Transient(TransientError::Timeout)
}

#[test]
fn test_limiter_never_exceeds_capacity_within_window() {
    let limiter = RateLimiter::with_config(RateLimiterConfig::new(4, Duration::from_secs(60)));

    let admitted = (0..20).filter(|_| limiter.admit("client")).count();
    assert_eq!(admitted, 4);
    assert_eq!(limiter.remaining("client"), 0);
}

#[test]
fn test_limiter_recovers_after_quiet_window() {
    let limiter = RateLimiter::with_config(RateLimiterConfig::new(3, Duration::from_millis(40)));

    for _ in 0..3 {
        assert!(limiter.admit("client"));
    }
    assert!(!limiter.admit("client"));

    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(limiter.remaining("client"), 3);
    assert!(limiter.admit("client"));
}

#[test]
fn test_breaker_threshold_two_needs_two_consecutive_failures() {
    let cb = CircuitBreaker::with_config(CircuitBreakerConfig::new().failure_threshold(2));

    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Closed);

    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_breaker_full_recovery_cycle() {
    let cb = CircuitBreaker::with_config(
        CircuitBreakerConfig::new()
            .failure_threshold(2)
            .success_threshold(1)
            .reset_timeout(Duration::from_millis(30)),
    );

    cb.record_failure();
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);

    // Rejected before the cooldown elapses, wrapped call untouched
    let result: Result<(), _> = cb.execute(|| async { Ok(()) }).await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(40)).await;

    // The next attempted call probes and, with threshold 1, closes
    let result = cb.execute(|| async { Ok::<_, ProxyError>(()) }).await;
    assert!(result.is_ok());
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_half_open_failure_restarts_cooldown() {
    let cb = CircuitBreaker::with_config(
        CircuitBreakerConfig::new()
            .failure_threshold(1)
            .reset_timeout(Duration::from_millis(30)),
    );

    cb.record_failure();
    tokio::time::sleep(Duration::from_millis(40)).await;

    let result: Result<(), _> = cb.execute(|| async { Err(transient()) }).await;
    assert!(result.is_err());
    assert_eq!(cb.state(), CircuitState::Open);

    // Fresh cooldown: an immediate attempt is still rejected
    assert!(cb.try_acquire().is_err());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(cb.try_acquire().is_ok());
}

#[test]
fn test_backoff_strictly_increasing_below_cap() {
    let config = RetryConfig::new()
        .initial_delay(Duration::from_millis(50))
        .multiplier(2.0)
        .max_delay(Duration::from_secs(60))
        .jitter(false);

    let mut previous = Duration::ZERO;
    for retry in 1..=6 {
        let delay = config.delay_for_retry(retry);
        assert!(delay > previous, "delay must grow with each retry");
        assert!(delay <= Duration::from_secs(60));
        previous = delay;
    }
}

#[test]
fn test_executor_usable_from_blocking_context() {
    let executor = crate::resilience::RetryExecutor::new();
    let result = tokio_test::block_on(
        executor.run(&crate::resilience::DefaultClassifier, || async { Ok(1) }),
    );
    assert_eq!(result.unwrap(), 1);
}

#[test]
fn test_backoff_never_exceeds_cap_before_jitter() {
    let config = RetryConfig::new()
        .initial_delay(Duration::from_millis(500))
        .multiplier(3.0)
        .max_delay(Duration::from_secs(2))
        .jitter(false);

    for retry in 1..=10 {
        assert!(config.delay_for_retry(retry) <= Duration::from_secs(2));
    }
}
