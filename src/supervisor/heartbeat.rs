//! Heartbeat timer.
//!
//! Periodic evidence that the relay is alive. The beat is suppressed when
//! nothing corroborates liveness — a heartbeat is evidence, not an
//! unconditional clock — so a stalled connection cannot keep masquerading
//! as healthy. Every 5th beat samples memory, every 10th logs a full
//! statistics line.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityJournal;
use crate::gateway::AiGateway;
use crate::supervisor::{
    read_rss_mb, LivenessProbe, ReconnectionEscalator, SupervisorState,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Any activity within this window lets the beat through even when the
/// probe says not-connected.
const ACTIVITY_WINDOW: Duration = Duration::from_secs(120);
const STATS_EVERY: u64 = 10;
const MEMORY_EVERY: u64 = 5;

pub const DEFAULT_MEMORY_WARN_MB: u64 = 1024;
pub const DEFAULT_MEMORY_CRITICAL_MB: u64 = 1536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
}

pub struct HeartbeatTimer {
    interval: Duration,
    probe: Arc<LivenessProbe>,
    journal: Arc<ActivityJournal>,
    state: Arc<SupervisorState>,
    gateway: Arc<AiGateway>,
    escalator: Arc<ReconnectionEscalator>,
    memory_warn_mb: u64,
    memory_critical_mb: u64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatTimer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interval: Duration,
        probe: Arc<LivenessProbe>,
        journal: Arc<ActivityJournal>,
        state: Arc<SupervisorState>,
        gateway: Arc<AiGateway>,
        escalator: Arc<ReconnectionEscalator>,
        memory_warn_mb: u64,
        memory_critical_mb: u64,
    ) -> Self {
        Self {
            interval,
            probe,
            journal,
            state,
            gateway,
            escalator,
            memory_warn_mb,
            memory_critical_mb,
            task: Mutex::new(None),
        }
    }

    pub fn timer_state(&self) -> TimerState {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        match &*task {
            Some(handle) if !handle.is_finished() => TimerState::Running,
            _ => TimerState::Idle,
        }
    }

    /// Idle → Running. Emits one immediate tick, then ticks on the
    /// interval. Calling `start` while Running logs a warning and no-ops.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(&*task, Some(handle) if !handle.is_finished()) {
            warn!("Heartbeat timer already running — start ignored");
            return;
        }

        let timer = self.clone();
        *task = Some(tokio::spawn(async move {
            info!(
                interval_secs = timer.interval.as_secs(),
                "Heartbeat timer started"
            );
            loop {
                timer.tick().await;
                tokio::time::sleep(timer.interval).await;
            }
        }));
    }

    /// Running → Idle. Calling `stop` while Idle is a no-op.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            info!("Heartbeat timer stopped");
        }
    }

    async fn tick(&self) {
        let signals = self.probe.assess().await;
        let recent_activity = self.journal.recent_activity(ACTIVITY_WINDOW);
        if should_suppress(signals.is_connected(), recent_activity) {
            warn!(
                liveness_score = signals.composite_score(),
                "Heartbeat suppressed — no liveness evidence"
            );
            return;
        }

        let count = self.state.increment_beats();
        self.state.record_heartbeat();

        if count % STATS_EVERY == 0 {
            info!(
                beats = count,
                uptime_secs = self.state.uptime_secs(),
                consecutive_failures = self.state.failures(),
                liveness_score = signals.composite_score(),
                breaker = ?self.gateway.breaker_status(),
                "Heartbeat statistics"
            );
        } else {
            debug!(beat = count, "Heartbeat");
        }

        if count % MEMORY_EVERY == 0 {
            self.sample_memory().await;
        }
    }

    async fn sample_memory(&self) {
        let Some(rss_mb) = read_rss_mb() else {
            return;
        };

        if rss_mb >= self.memory_critical_mb {
            error!(
                rss_mb,
                critical_mb = self.memory_critical_mb,
                "Critical memory usage — releasing caches and requesting full restart"
            );
            self.gateway.release_cached_models();
            if let Err(e) = self.escalator.request_full_restart("critical-memory").await {
                error!(error = %e, "Critical-memory restart failed");
            }
        } else if rss_mb >= self.memory_warn_mb {
            warn!(
                rss_mb,
                warn_mb = self.memory_warn_mb,
                "High memory usage — releasing cached model handles"
            );
            self.gateway.release_cached_models();
        } else {
            debug!(rss_mb, "Memory sample");
        }
    }
}

/// The beat is suppressed only when the probe says not-connected AND there
/// has been no recent activity of any kind.
fn should_suppress(connected: bool, recent_activity: bool) -> bool {
    !connected && !recent_activity
}
