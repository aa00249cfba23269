//! AIGateway — the one path through which chat messages reach the backend.
//!
//! Wraps every call with the circuit breaker, the fingerprint-keyed model
//! cache, a deadline race, and failure classification. Callers get either
//! sanitized response text or a [`BackendError`] they can render to the user.

mod breaker;
mod cache;
mod fingerprint;

pub use breaker::{BreakerStatus, CircuitBreaker};
pub use cache::ModelCache;
pub use fingerprint::fingerprint;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use crate::providers::BackendError;
use crate::quarantine::QuarantineStore;
use crate::sanitize::sanitize_response;
use crate::traits::{ModelBackend, ModelHandle};
use crate::types::{GenerationConfig, RequestPart};

pub struct AiGateway {
    backend: Arc<dyn ModelBackend>,
    config: GenerationConfig,
    cache: Mutex<ModelCache>,
    breaker: CircuitBreaker,
    quarantine: Option<Arc<QuarantineStore>>,
}

impl AiGateway {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        config: GenerationConfig,
        cache_capacity: usize,
        breaker: CircuitBreaker,
        quarantine: Option<Arc<QuarantineStore>>,
    ) -> Self {
        Self {
            backend,
            config,
            cache: Mutex::new(ModelCache::new(cache_capacity)),
            breaker,
            quarantine,
        }
    }

    /// Relay one request to the backend, racing it against `timeout`.
    ///
    /// Every outcome is reported to the circuit breaker. On timeout the
    /// in-flight call is abandoned, not cancelled — the backend offers no
    /// cancellation primitive, so the detached task's late result is
    /// silently discarded.
    pub async fn invoke(
        &self,
        chat_id: &str,
        parts: &[RequestPart],
        timeout: Duration,
    ) -> Result<String, BackendError> {
        self.breaker.check()?;
        let handle = self.acquire_model().await?;

        let owned_parts: Vec<RequestPart> = parts.to_vec();
        let call = tokio::spawn(async move { handle.generate_content(&owned_parts).await });

        let joined = match tokio::time::timeout(timeout, call).await {
            Ok(joined) => joined,
            Err(_) => {
                // Dropping the JoinHandle detaches the task; it keeps
                // running and its eventual result is ignored.
                warn!(chat_id, timeout_ms = timeout.as_millis() as u64, "Backend call abandoned after deadline");
                self.breaker.record_failure();
                return Err(BackendError::Timeout);
            }
        };

        let result = match joined {
            Ok(result) => result,
            Err(join_err) => {
                self.breaker.record_failure();
                return Err(BackendError::Transient {
                    message: format!("backend task failed: {}", join_err),
                });
            }
        };

        match result {
            Ok(text) => {
                self.breaker.record_success();
                Ok(sanitize_response(&text))
            }
            Err(err) => {
                self.breaker.record_failure();
                let classified = BackendError::classify(&err);
                if let BackendError::SafetyBlocked { detail } = &classified {
                    self.quarantine_audio(chat_id, parts, detail).await;
                }
                Err(classified)
            }
        }
    }

    /// Fetch (or construct) the model handle for the current generation
    /// config. Construction failures count against the breaker; successes
    /// count for it.
    async fn acquire_model(&self) -> Result<Arc<dyn ModelHandle>, BackendError> {
        let key = fingerprint(&self.config);

        if let Some(handle) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            debug!(fingerprint = %&key[..12], "Model cache hit");
            return Ok(handle);
        }

        match self.backend.create_model(&self.config).await {
            Ok(handle) => {
                self.breaker.record_success();
                self.cache
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key, handle.clone());
                Ok(handle)
            }
            Err(err) => {
                warn!(error = %err, "Model handle construction failed");
                self.breaker.record_failure();
                Err(BackendError::Transient {
                    message: err.to_string(),
                })
            }
        }
    }

    async fn quarantine_audio(&self, chat_id: &str, parts: &[RequestPart], detail: &str) {
        let Some(store) = &self.quarantine else {
            return;
        };
        for part in parts {
            if let RequestPart::Audio { mime_type, data } = part {
                if let Err(e) = store.quarantine(data, chat_id, mime_type, detail).await {
                    warn!(error = %e, chat_id, "Failed to quarantine blocked audio");
                }
            }
        }
    }

    /// Drop all cached model handles (cleanup escalation tier / memory
    /// pressure relief).
    pub fn release_cached_models(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if !cache.is_empty() {
            debug!(dropped = cache.len(), "Releasing cached model handles");
            cache.clear();
        }
    }

    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    #[cfg(test)]
    pub fn cached_models(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, ScriptedCall};

    fn gateway_with(backend: Arc<MockBackend>, breaker: CircuitBreaker) -> AiGateway {
        AiGateway::new(
            backend,
            GenerationConfig::default(),
            cache::DEFAULT_CAPACITY,
            breaker,
            None,
        )
    }

    #[tokio::test]
    async fn sixth_call_short_circuits_without_contacting_backend() {
        let backend = Arc::new(MockBackend::new());
        for _ in 0..6 {
            backend.push(ScriptedCall::Err("boom".into()));
        }
        let gateway = gateway_with(backend.clone(), CircuitBreaker::default());

        for _ in 0..5 {
            let err = gateway
                .invoke("chat-1", &[RequestPart::Text("salut".into())], Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(err, BackendError::Transient { .. }));
        }
        assert_eq!(backend.generate_calls(), 5);

        let err = gateway
            .invoke("chat-1", &[RequestPart::Text("salut".into())], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ServiceUnavailable { .. }));
        assert_eq!(backend.generate_calls(), 5, "open breaker must not contact backend");
    }

    #[tokio::test]
    async fn successful_call_is_sanitized() {
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Ok("Amélie: **Salut!**".into()));
        let gateway = gateway_with(backend, CircuitBreaker::default());

        let reply = gateway
            .invoke("chat-1", &[RequestPart::Text("salut".into())], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply, "Salut!");
    }

    #[tokio::test]
    async fn slow_backend_yields_timeout() {
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Sleep(Duration::from_millis(500)));
        let gateway = gateway_with(backend, CircuitBreaker::default());

        let err = gateway
            .invoke("chat-1", &[RequestPart::Text("salut".into())], Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }

    #[tokio::test]
    async fn safety_block_quarantines_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(QuarantineStore::new(tmp.path().join("q")));
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Err("candidate blocked by safety filter".into()));

        let gateway = AiGateway::new(
            backend,
            GenerationConfig::default(),
            cache::DEFAULT_CAPACITY,
            CircuitBreaker::default(),
            Some(store.clone()),
        );

        let parts = [RequestPart::Audio {
            mime_type: "audio/ogg".into(),
            data: vec![9, 9, 9],
        }];
        let err = gateway
            .invoke("chat-1", &parts, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::SafetyBlocked { .. }));

        let entries = std::fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(entries, 2, "payload plus sidecar");
    }

    #[tokio::test]
    async fn handle_is_cached_across_calls() {
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Ok("un".into()));
        backend.push(ScriptedCall::Ok("deux".into()));
        let gateway = gateway_with(backend.clone(), CircuitBreaker::default());

        gateway
            .invoke("c", &[RequestPart::Text("1".into())], Duration::from_secs(5))
            .await
            .unwrap();
        gateway
            .invoke("c", &[RequestPart::Text("2".into())], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(backend.create_calls(), 1, "same fingerprint reuses the handle");
        assert_eq!(gateway.cached_models(), 1);
    }

    #[tokio::test]
    async fn half_open_trial_success_closes_the_circuit() {
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Err("boom".into()));
        backend.push(ScriptedCall::Ok("ça roule".into()));
        // Threshold 1 and no cool-down: first failure opens, next call is
        // the half-open trial.
        let gateway = gateway_with(backend, CircuitBreaker::new(1, Duration::ZERO));

        let _ = gateway
            .invoke("c", &[RequestPart::Text("1".into())], Duration::from_secs(5))
            .await
            .unwrap_err();
        let reply = gateway
            .invoke("c", &[RequestPart::Text("2".into())], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply, "ça roule");
        assert_eq!(gateway.breaker_status(), BreakerStatus::Closed);
    }
}
