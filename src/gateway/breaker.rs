//! Circuit breaker gating calls to the AI backend.
//!
//! Closed → Open after `threshold` consecutive failures. Open rejects
//! immediately until `reset_timeout` elapses, then admits exactly one
//! half-open trial: success closes the circuit, failure re-opens it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::providers::BackendError;

pub const DEFAULT_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    status: BreakerStatus,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    threshold: u32,
    reset_timeout: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                status: BreakerStatus::Closed,
                failure_count: 0,
                last_failure_at: None,
            }),
            threshold: threshold.max(1),
            reset_timeout,
        }
    }

    /// Gate one call. `Err(ServiceUnavailable)` means the backend must not
    /// be contacted. Transitioning Open → HalfOpen admits exactly the one
    /// caller that observed the elapsed cool-down.
    pub fn check(&self) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.status {
            BreakerStatus::Closed => Ok(()),
            BreakerStatus::HalfOpen => Err(BackendError::ServiceUnavailable {
                retry_in: self.reset_timeout,
            }),
            BreakerStatus::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.reset_timeout {
                    info!("Circuit breaker half-open — admitting one trial call");
                    inner.status = BreakerStatus::HalfOpen;
                    Ok(())
                } else {
                    Err(BackendError::ServiceUnavailable {
                        retry_in: self.reset_timeout - elapsed,
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.status != BreakerStatus::Closed || inner.failure_count > 0 {
            info!("Circuit breaker closed after successful call");
        }
        inner.status = BreakerStatus::Closed;
        inner.failure_count = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.last_failure_at = Some(Instant::now());
        match inner.status {
            BreakerStatus::HalfOpen => {
                // Trial failed: back to Open, count stays at threshold.
                warn!("Circuit breaker trial call failed — reopening");
                inner.status = BreakerStatus::Open;
            }
            _ => {
                inner.failure_count += 1;
                if inner.failure_count >= self.threshold && inner.status == BreakerStatus::Closed {
                    warn!(
                        failures = inner.failure_count,
                        "Circuit breaker opened — rejecting backend calls"
                    );
                    inner.status = BreakerStatus::Open;
                }
            }
        }
    }

    pub fn status(&self) -> BreakerStatus {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).status
    }

    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failure_count
    }
}
