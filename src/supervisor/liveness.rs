//! Composite connectivity assessment for the chat transport.
//!
//! The transport library misreports disconnection in both directions, so no
//! single signal is authoritative. Four independent signals are counted and
//! at least two must agree before the relay is declared connected.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::activity::ActivityJournal;
use crate::supervisor::TransportSlot;

/// Inbound activity newer than this corroborates connectivity.
pub const INBOUND_WINDOW: Duration = Duration::from_secs(120);
/// Outbound sends newer than this corroborate connectivity.
pub const OUTBOUND_WINDOW: Duration = Duration::from_secs(180);
/// Signals that must agree before declaring "connected".
pub const CONNECTED_THRESHOLD: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessSignals {
    pub has_identity: bool,
    pub transport_internal_state: bool,
    pub recent_inbound_activity: bool,
    pub recent_outbound_activity: bool,
}

impl LivenessSignals {
    pub fn composite_score(&self) -> u8 {
        [
            self.has_identity,
            self.transport_internal_state,
            self.recent_inbound_activity,
            self.recent_outbound_activity,
        ]
        .iter()
        .filter(|&&signal| signal)
        .count() as u8
    }

    pub fn is_connected(&self) -> bool {
        self.composite_score() >= CONNECTED_THRESHOLD
    }
}

pub struct LivenessProbe {
    slot: TransportSlot,
    journal: Arc<ActivityJournal>,
}

impl LivenessProbe {
    pub fn new(slot: TransportSlot, journal: Arc<ActivityJournal>) -> Self {
        Self { slot, journal }
    }

    pub async fn assess(&self) -> LivenessSignals {
        let transport = self.slot.current().await;

        let has_identity = transport.identity().await.is_some();
        // A failing introspection query means "no evidence", not an error.
        let transport_internal_state = transport
            .internal_connectivity_hint()
            .await
            .unwrap_or(false);
        let recent_inbound_activity = self.journal.recent_inbound(INBOUND_WINDOW);
        let recent_outbound_activity = self.journal.recent_outbound(OUTBOUND_WINDOW);

        let signals = LivenessSignals {
            has_identity,
            transport_internal_state,
            recent_inbound_activity,
            recent_outbound_activity,
        };
        debug!(
            score = signals.composite_score(),
            has_identity,
            transport_internal_state,
            recent_inbound_activity,
            recent_outbound_activity,
            "Liveness assessed"
        );
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;
    use crate::testing::MockTransport;

    #[test]
    fn two_of_four_is_connected() {
        let signals = LivenessSignals {
            has_identity: true,
            transport_internal_state: false,
            recent_inbound_activity: true,
            recent_outbound_activity: false,
        };
        assert_eq!(signals.composite_score(), 2);
        assert!(signals.is_connected());
    }

    #[test]
    fn one_of_four_is_not_connected() {
        let signals = LivenessSignals {
            has_identity: true,
            ..Default::default()
        };
        assert_eq!(signals.composite_score(), 1);
        assert!(!signals.is_connected());
    }

    #[tokio::test]
    async fn probe_reads_all_four_signals() {
        let transport = MockTransport::connected();
        let journal = Arc::new(ActivityJournal::new());
        journal.record(ActivityKind::Inbound, "chat-1");
        journal.record(ActivityKind::Outbound, "chat-1");

        let probe = LivenessProbe::new(
            TransportSlot::new(Arc::new(transport)),
            journal,
        );
        let signals = probe.assess().await;
        assert_eq!(signals.composite_score(), 4);
    }

    #[tokio::test]
    async fn hint_query_failure_counts_as_false() {
        let transport = MockTransport::connected();
        transport.state.set_hint_errors(true);
        let probe = LivenessProbe::new(
            TransportSlot::new(Arc::new(transport)),
            Arc::new(ActivityJournal::new()),
        );
        let signals = probe.assess().await;
        assert!(!signals.transport_internal_state);
        // identity alone is not enough
        assert!(!signals.is_connected());
    }
}
