//! Stdio transport — a development/loopback implementation of the
//! [`Transport`] collaborator.
//!
//! Reads one inbound message per stdin line and prints replies to stdout.
//! Useful for running the daemon locally without a real chat network; the
//! production deployment points the slot at a real transport client.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::traits::Transport;
use crate::types::InboundMessage;

const STDIO_CHAT_ID: &str = "stdio";

pub struct StdioTransport {
    identity: String,
}

impl StdioTransport {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("[{}] {}\n", recipient, text).as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn identity(&self) -> Option<String> {
        Some(self.identity.clone())
    }

    async fn internal_connectivity_hint(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn reinitialize(&self) -> anyhow::Result<Arc<dyn Transport>> {
        info!("Stdio transport reinitialized");
        Ok(Arc::new(StdioTransport::new(&self.identity)))
    }
}

/// Spawn the stdin reader feeding the relay's inbound channel. The task
/// ends (closing the channel) on EOF.
pub fn spawn_stdin_reader(tx: mpsc::Sender<InboundMessage>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx
                        .send(InboundMessage::text(STDIO_CHAT_ID, line))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Stdin closed — no more inbound messages");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Stdin read failed");
                    break;
                }
            }
        }
    });
}
