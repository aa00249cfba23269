use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{GenerationConfig, RequestPart};

/// Chat transport collaborator — the connection to the messaging network.
///
/// The daemon never speaks the wire protocol itself; it only consumes this
/// surface. Restart/recovery actions replace the whole instance via
/// [`Transport::reinitialize`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()>;

    /// The established identity on the network, if any (e.g. the bot's own
    /// account id). `None` means the session never finished logging in or
    /// has lost it.
    async fn identity(&self) -> Option<String>;

    /// The transport library's own opinion of whether it is connected.
    /// Known to misreport in both directions — callers must corroborate
    /// with other signals.
    async fn internal_connectivity_hint(&self) -> anyhow::Result<bool>;

    async fn close(&self) -> anyhow::Result<()>;

    /// Build a fresh replacement client. The old instance is discarded by
    /// the caller; it is not reused after this returns.
    async fn reinitialize(&self) -> anyhow::Result<Arc<dyn Transport>>;
}

/// AI backend collaborator — constructs model handles from generation config.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn create_model(
        &self,
        config: &GenerationConfig,
    ) -> anyhow::Result<Arc<dyn ModelHandle>>;
}

/// A usable model instance. Handles are cached by fingerprint and shared.
#[async_trait]
pub trait ModelHandle: Send + Sync {
    async fn generate_content(&self, parts: &[RequestPart]) -> anyhow::Result<String>;
}
