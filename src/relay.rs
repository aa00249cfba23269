//! The relay loop: inbound message → gateway → outbound reply.
//!
//! Thin glue by design. All failure handling lives in the gateway and the
//! supervisor; the relay only renders errors as user-facing text and makes
//! a bounded best-effort attempt at delivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::activity::{ActivityJournal, ActivityKind};
use crate::gateway::AiGateway;
use crate::supervisor::TransportSlot;
use crate::types::InboundMessage;

pub struct Relay {
    gateway: Arc<AiGateway>,
    slot: TransportSlot,
    journal: Arc<ActivityJournal>,
    request_timeout: Duration,
    send_attempts: u32,
}

impl Relay {
    pub fn new(
        gateway: Arc<AiGateway>,
        slot: TransportSlot,
        journal: Arc<ActivityJournal>,
        request_timeout: Duration,
        send_attempts: u32,
    ) -> Self {
        Self {
            gateway,
            slot,
            journal,
            request_timeout,
            send_attempts: send_attempts.max(1),
        }
    }

    /// Consume inbound messages until the transport channel closes.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundMessage>) {
        info!("Relay loop started");
        while let Some(message) = rx.recv().await {
            self.handle(message).await;
        }
        info!("Relay loop finished — inbound channel closed");
    }

    pub async fn handle(&self, message: InboundMessage) {
        self.journal.record(ActivityKind::Inbound, &message.chat_id);

        let reply = match self
            .gateway
            .invoke(&message.chat_id, &message.parts, self.request_timeout)
            .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!(chat_id = %message.chat_id, error = %err, "AI call failed");
                err.user_message()
            }
        };

        if reply.is_empty() {
            return;
        }
        self.deliver(&message.chat_id, &reply).await;
    }

    /// Best-effort delivery with bounded retries. A message that cannot be
    /// sent is logged and dropped, never requeued.
    async fn deliver(&self, chat_id: &str, text: &str) {
        let transport = self.slot.current().await;
        for attempt in 1..=self.send_attempts {
            match transport.send_message(chat_id, text).await {
                Ok(()) => {
                    self.journal.record(ActivityKind::Outbound, chat_id);
                    return;
                }
                Err(e) => {
                    warn!(chat_id, attempt, error = %e, "Outbound send failed");
                }
            }
        }
        error!(
            chat_id,
            attempts = self.send_attempts,
            "Delivery abandoned after retries"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CircuitBreaker;
    use crate::testing::{MockBackend, MockTransport, ScriptedCall};
    use crate::types::GenerationConfig;

    fn build(
        transport: MockTransport,
        backend: Arc<MockBackend>,
    ) -> (Relay, Arc<ActivityJournal>) {
        let journal = Arc::new(ActivityJournal::new());
        let gateway = Arc::new(AiGateway::new(
            backend,
            GenerationConfig::default(),
            10,
            CircuitBreaker::default(),
            None,
        ));
        let relay = Relay::new(
            gateway,
            TransportSlot::new(Arc::new(transport)),
            journal.clone(),
            Duration::from_secs(5),
            2,
        );
        (relay, journal)
    }

    #[tokio::test]
    async fn relays_sanitized_reply_and_journals_both_directions() {
        let transport = MockTransport::connected();
        let transport_state = transport.state.clone();
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Ok("Amélie: **Salut toi!**".into()));
        let (relay, journal) = build(transport, backend);

        relay.handle(InboundMessage::text("chat-1", "salut")).await;

        let sent = transport_state.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "chat-1");
        assert_eq!(sent[0].1, "Salut toi!");
        assert!(journal.recent_inbound(Duration::from_secs(120)));
        assert!(journal.recent_outbound(Duration::from_secs(180)));
    }

    #[tokio::test]
    async fn backend_failure_sends_user_facing_message() {
        let transport = MockTransport::connected();
        let transport_state = transport.state.clone();
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Err("connection reset".into()));
        let (relay, _journal) = build(transport, backend);

        relay.handle(InboundMessage::text("chat-1", "salut")).await;

        let sent = transport_state.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].1.contains("connection reset"), "raw error must not leak");
    }

    #[tokio::test]
    async fn undeliverable_reply_is_dropped_not_requeued() {
        let transport = MockTransport::connected();
        let transport_state = transport.state.clone();
        transport_state.set_fail_send(true);
        let backend = Arc::new(MockBackend::new());
        backend.push(ScriptedCall::Ok("réponse".into()));
        let (relay, journal) = build(transport, backend);

        relay.handle(InboundMessage::text("chat-1", "salut")).await;

        assert_eq!(transport_state.sent_count(), 0);
        assert!(!journal.recent_outbound(Duration::from_secs(180)));
    }
}
