//! Test infrastructure: MockBackend and MockTransport.
//!
//! Scripted collaborators for exercising the gateway and the supervisor
//! without a real network or AI provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::traits::{ModelBackend, ModelHandle, Transport};
use crate::types::{GenerationConfig, RequestPart};

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

/// One scripted `generate_content` outcome, consumed FIFO.
pub enum ScriptedCall {
    Ok(String),
    Err(String),
    /// Sleep before answering — for timeout races.
    Sleep(Duration),
}

#[derive(Default)]
struct MockBackendState {
    script: Mutex<VecDeque<ScriptedCall>>,
    create_calls: AtomicU32,
    generate_calls: AtomicU32,
    fail_create: AtomicBool,
}

/// Mock AI backend with a FIFO queue of scripted responses. An exhausted
/// script answers with a fixed string.
#[derive(Default)]
pub struct MockBackend {
    state: Arc<MockBackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: ScriptedCall) {
        self.state
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(call);
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.fail_create.store(fail, Ordering::Relaxed);
    }

    pub fn create_calls(&self) -> u32 {
        self.state.create_calls.load(Ordering::Relaxed)
    }

    pub fn generate_calls(&self) -> u32 {
        self.state.generate_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn create_model(
        &self,
        _config: &GenerationConfig,
    ) -> anyhow::Result<Arc<dyn ModelHandle>> {
        self.state.create_calls.fetch_add(1, Ordering::Relaxed);
        if self.state.fail_create.load(Ordering::Relaxed) {
            anyhow::bail!("scripted create_model failure");
        }
        Ok(Arc::new(MockHandle {
            state: self.state.clone(),
        }))
    }
}

struct MockHandle {
    state: Arc<MockBackendState>,
}

#[async_trait]
impl ModelHandle for MockHandle {
    async fn generate_content(&self, _parts: &[RequestPart]) -> anyhow::Result<String> {
        self.state.generate_calls.fetch_add(1, Ordering::Relaxed);
        let next = self
            .state
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(ScriptedCall::Ok(text)) => Ok(text),
            Some(ScriptedCall::Err(message)) => Err(anyhow::anyhow!(message)),
            Some(ScriptedCall::Sleep(d)) => {
                tokio::time::sleep(d).await;
                Ok("late response".to_string())
            }
            None => Ok("mock response".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Shared observable state — survives `reinitialize()` so tests can count
/// restarts across client generations.
#[derive(Default)]
pub struct MockTransportState {
    pub sent: Mutex<Vec<(String, String)>>,
    identity: Mutex<Option<String>>,
    hint: AtomicBool,
    hint_errors: AtomicBool,
    fail_send: AtomicBool,
    fail_reinit: AtomicBool,
    close_calls: AtomicU32,
    reinit_calls: AtomicU32,
}

impl MockTransportState {
    pub fn set_identity(&self, identity: Option<&str>) {
        *self.identity.lock().unwrap_or_else(|e| e.into_inner()) =
            identity.map(|s| s.to_string());
    }

    pub fn set_hint(&self, connected: bool) {
        self.hint.store(connected, Ordering::Relaxed);
    }

    pub fn set_hint_errors(&self, errors: bool) {
        self.hint_errors.store(errors, Ordering::Relaxed);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reinit(&self, fail: bool) {
        self.fail_reinit.store(fail, Ordering::Relaxed);
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::Relaxed)
    }

    pub fn reinit_calls(&self) -> u32 {
        self.reinit_calls.load(Ordering::Relaxed)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub struct MockTransport {
    pub state: Arc<MockTransportState>,
}

impl MockTransport {
    /// A transport that looks fully connected.
    pub fn connected() -> Self {
        let state = Arc::new(MockTransportState::default());
        state.set_identity(Some("amelie@mock"));
        state.set_hint(true);
        Self { state }
    }

    /// A transport with no identity and a negative connectivity hint.
    pub fn dead() -> Self {
        Self {
            state: Arc::new(MockTransportState::default()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()> {
        if self.state.fail_send.load(Ordering::Relaxed) {
            anyhow::bail!("scripted send failure");
        }
        self.state
            .sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn identity(&self) -> Option<String> {
        self.state
            .identity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn internal_connectivity_hint(&self) -> anyhow::Result<bool> {
        if self.state.hint_errors.load(Ordering::Relaxed) {
            anyhow::bail!("scripted hint failure");
        }
        Ok(self.state.hint.load(Ordering::Relaxed))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn reinitialize(&self) -> anyhow::Result<Arc<dyn Transport>> {
        if self.state.fail_reinit.load(Ordering::Relaxed) {
            anyhow::bail!("scripted reinitialize failure");
        }
        self.state.reinit_calls.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(MockTransport {
            state: self.state.clone(),
        }))
    }
}
