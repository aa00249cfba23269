//! Reconnection escalator.
//!
//! A state machine keyed by consecutive failed health checks, selecting one
//! of four recovery tiers of increasing invasiveness. Counters reset on any
//! successful recovery or healthy check; restarts are serialized through
//! the supervisor's single restart permit.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::gateway::AiGateway;
use crate::supervisor::{
    DiagnosticRecorder, LivenessProbe, SupervisorState, TransportSlot,
};

/// No heartbeat within this window marks the relay unhealthy even when the
/// liveness score looks fine.
pub const HEARTBEAT_WINDOW: Duration = Duration::from_secs(120);

pub const DEFAULT_FAILURE_LIMIT: u32 = 5;
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    /// Swap in a fresh client, nothing else.
    Light,
    /// Release caches first, then reconnect.
    Cleanup,
    /// Close the old client before reconnecting.
    Standard,
    /// Diagnostic snapshot plus full client restart.
    FullRestart,
}

/// Tier selection by consecutive-failure count.
pub fn tier_for(consecutive_failures: u32, limit: u32) -> RecoveryTier {
    match consecutive_failures {
        1 => RecoveryTier::Light,
        2 => RecoveryTier::Cleanup,
        n if n >= limit => RecoveryTier::FullRestart,
        _ => RecoveryTier::Standard,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    /// Another restart was in flight; this request was dropped.
    Skipped,
}

pub struct ReconnectionEscalator {
    state: Arc<SupervisorState>,
    probe: Arc<LivenessProbe>,
    slot: TransportSlot,
    recorder: Arc<DiagnosticRecorder>,
    gateway: Arc<AiGateway>,
    limit: u32,
    check_interval: Duration,
}

impl ReconnectionEscalator {
    pub fn new(
        state: Arc<SupervisorState>,
        probe: Arc<LivenessProbe>,
        slot: TransportSlot,
        recorder: Arc<DiagnosticRecorder>,
        gateway: Arc<AiGateway>,
        limit: u32,
        check_interval: Duration,
    ) -> Self {
        let limit = if limit < 3 {
            warn!(
                configured = limit,
                effective = 3u32,
                "Failure limit below the supported minimum, raising"
            );
            3
        } else {
            limit
        };
        Self {
            state,
            probe,
            slot,
            recorder,
            gateway,
            limit,
            check_interval,
        }
    }

    #[cfg(test)]
    pub fn failure_limit(&self) -> u32 {
        self.limit
    }

    /// Spawn the periodic connection-check loop.
    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            info!(
                interval_secs = self.check_interval.as_secs(),
                failure_limit = self.limit,
                "Reconnection escalator started"
            );
            loop {
                tokio::time::sleep(self.check_interval).await;
                self.check().await;
            }
        });
    }

    /// One health evaluation: reassess liveness, update the failure counter,
    /// and run the selected recovery tier when unhealthy.
    pub async fn check(&self) {
        let signals = self.probe.assess().await;
        let heartbeat_fresh = self.state.heartbeat_within(HEARTBEAT_WINDOW);
        let healthy = signals.is_connected() && heartbeat_fresh;

        if healthy {
            let prior = self.state.reset_failures();
            if prior > 0 {
                info!(prior_failures = prior, "Connection recovered on its own");
            }
            return;
        }

        let failures = self.state.increment_failures();
        let tier = tier_for(failures, self.limit);
        warn!(
            consecutive_failures = failures,
            liveness_score = signals.composite_score(),
            heartbeat_fresh,
            tier = ?tier,
            "Connection check unhealthy — escalating"
        );

        match self.execute(tier).await {
            Ok(RecoveryOutcome::Recovered) => {
                self.state.reset_failures();
                // Refresh the heartbeat stamp so the next check does not
                // re-trigger before a real beat lands.
                self.state.record_heartbeat();
                info!(tier = ?tier, "Recovery tier succeeded");
            }
            Ok(RecoveryOutcome::Skipped) => {}
            Err(e) => {
                // Counter retained; the next cycle escalates further.
                error!(tier = ?tier, error = %e, "Recovery tier failed");
            }
        }
    }

    async fn execute(&self, tier: RecoveryTier) -> anyhow::Result<RecoveryOutcome> {
        match tier {
            RecoveryTier::Light => {
                self.reconnect(false).await?;
                Ok(RecoveryOutcome::Recovered)
            }
            RecoveryTier::Cleanup => {
                self.gateway.release_cached_models();
                self.reconnect(false).await?;
                Ok(RecoveryOutcome::Recovered)
            }
            RecoveryTier::Standard => {
                self.reconnect(true).await?;
                Ok(RecoveryOutcome::Recovered)
            }
            RecoveryTier::FullRestart => self.full_restart("escalation-limit").await,
        }
    }

    /// Replace the transport client. `close_first` makes the old client
    /// release its resources before the swap; close failures are logged and
    /// do not block the replacement.
    async fn reconnect(&self, close_first: bool) -> anyhow::Result<()> {
        let current = self.slot.current().await;
        if close_first {
            if let Err(e) = current.close().await {
                warn!(error = %e, "Transport close failed before reconnect");
            }
        }
        let fresh = current.reinitialize().await?;
        self.slot.replace(fresh).await;
        info!(closed_first = close_first, "Transport client replaced");
        Ok(())
    }

    /// Full client restart: snapshot, close, rebuild. Serialized — a second
    /// request while one is in flight is dropped with a log entry.
    pub async fn full_restart(&self, reason: &str) -> anyhow::Result<RecoveryOutcome> {
        if !self.state.try_begin_restart() {
            warn!(reason, "Restart already in flight — dropping request");
            return Ok(RecoveryOutcome::Skipped);
        }

        let result = async {
            if let Err(e) = self.recorder.record(reason).await {
                warn!(error = %e, "Diagnostic snapshot failed before restart");
            }
            self.reconnect(true).await
        }
        .await;

        self.state.end_restart();
        result.map(|()| RecoveryOutcome::Recovered)
    }

    /// Entry point for out-of-band full-restart triggers (critical memory,
    /// watchdog stall).
    pub async fn request_full_restart(&self, reason: &str) -> anyhow::Result<RecoveryOutcome> {
        let outcome = self.full_restart(reason).await?;
        if outcome == RecoveryOutcome::Recovered {
            self.state.reset_failures();
            self.state.record_heartbeat();
        }
        Ok(outcome)
    }
}
