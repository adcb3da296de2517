//! Test doubles for exercising the resilience stack without a live dependency.

use crate::downstream::Downstream;
use crate::errors::{ProxyError, ProxyResult, TransientError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// A call that fails a fixed number of times, then succeeds
///
/// The default failure is a timeout; any error factory can be supplied for
/// other shapes.
pub struct FlakyCall {
    remaining_failures: AtomicU32,
    invocations: AtomicU32,
    error: Box<dyn Fn() -> ProxyError + Send + Sync>,
}

impl FlakyCall {
    /// Create a call that times out `failures` times before succeeding
    pub fn failing_times(failures: u32) -> Self {
        Self::failing_times_with(failures, || {
            ProxyError::Transient(TransientError::Timeout)
        })
    }

    /// Create a call that fails `failures` times with a custom error
    pub fn failing_times_with(
        failures: u32,
        error: impl Fn() -> ProxyError + Send + Sync + 'static,
    ) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            invocations: AtomicU32::new(0),
            error: Box::new(error),
        }
    }

    /// Invoke the call
    pub async fn call(&self) -> ProxyResult<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if failed {
            Err((self.error)())
        } else {
            Ok(json!({ "status": "ok" }))
        }
    }

    /// Get the number of times the call was invoked
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FlakyCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyCall")
            .field(
                "remaining_failures",
                &self.remaining_failures.load(Ordering::SeqCst),
            )
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Downstream for FlakyCall {
    async fn call(&self, _payload: &Value) -> ProxyResult<Value> {
        FlakyCall::call(self).await
    }
}

/// A call that plays back a scripted queue of results
///
/// Once the script is exhausted, every invocation succeeds.
pub struct ScriptedCall {
    script: Mutex<VecDeque<ProxyResult<Value>>>,
    invocations: AtomicU32,
}

impl ScriptedCall {
    /// Create a call from a result script, consumed front to back
    pub fn new(script: impl IntoIterator<Item = ProxyResult<Value>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            invocations: AtomicU32::new(0),
        }
    }

    /// Invoke the call
    pub async fn call(&self) -> ProxyResult<Value> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "ok" })))
    }

    /// Get the number of times the call was invoked
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ScriptedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCall")
            .field("queued", &self.script.lock().len())
            .field("invocations", &self.invocations())
            .finish()
    }
}

#[async_trait]
impl Downstream for ScriptedCall {
    async fn call(&self, _payload: &Value) -> ProxyResult<Value> {
        ScriptedCall::call(self).await
    }
}
