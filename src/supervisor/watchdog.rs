//! Dual-timer watchdog cross-check.
//!
//! Detects total process stall, not mere transport disconnection. The inner
//! timer does nothing but overwrite an on-disk timestamp marker; the outer
//! timer reads it back. The two tasks share no in-memory state, so a hang
//! in the liveness/check machinery cannot also disable the watchdog. A
//! stale marker means the inner timer itself stopped firing — the event
//! loop is wedged — and triggers emergency recovery exactly once per stall
//! episode.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::gateway::AiGateway;
use crate::supervisor::escalator::RecoveryOutcome;
use crate::supervisor::{ReconnectionEscalator, SupervisorState, TransportSlot};

pub const DEFAULT_INNER_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_OUTER_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(120);

pub struct WatchdogCrossCheck {
    marker_path: PathBuf,
    inner_interval: Duration,
    outer_interval: Duration,
    stale_after: Duration,
    /// One emergency per stall episode; re-armed when the marker is fresh.
    fired: AtomicBool,
    /// Set after the inner timer's first successful write. Until then a
    /// missing marker is expected; afterwards it means the marker was lost.
    marker_written: AtomicBool,
    escalator: Arc<ReconnectionEscalator>,
    gateway: Arc<AiGateway>,
    slot: TransportSlot,
    state: Arc<SupervisorState>,
}

impl WatchdogCrossCheck {
    pub fn new(
        marker_path: impl Into<PathBuf>,
        inner_interval: Duration,
        outer_interval: Duration,
        stale_after: Duration,
        escalator: Arc<ReconnectionEscalator>,
        gateway: Arc<AiGateway>,
        slot: TransportSlot,
        state: Arc<SupervisorState>,
    ) -> Self {
        Self {
            marker_path: marker_path.into(),
            inner_interval,
            outer_interval,
            stale_after,
            fired: AtomicBool::new(false),
            marker_written: AtomicBool::new(false),
            escalator,
            gateway,
            slot,
            state,
        }
    }

    /// Spawn the two independent timer tasks.
    pub fn spawn(self: Arc<Self>) {
        let inner = self.clone();
        tokio::spawn(async move {
            info!(
                marker = %inner.marker_path.display(),
                interval_secs = inner.inner_interval.as_secs(),
                "Watchdog inner timer started"
            );
            loop {
                inner.write_marker().await;
                tokio::time::sleep(inner.inner_interval).await;
            }
        });

        tokio::spawn(async move {
            info!(
                interval_secs = self.outer_interval.as_secs(),
                stale_after_secs = self.stale_after.as_secs(),
                "Watchdog outer timer started"
            );
            loop {
                tokio::time::sleep(self.outer_interval).await;
                self.check().await;
            }
        });
    }

    /// Overwrite the marker with the current Unix-millisecond timestamp.
    /// Unconditional — the inner timer carries no health logic at all.
    async fn write_marker(&self) {
        let stamp = Utc::now().timestamp_millis().to_string();
        match tokio::fs::write(&self.marker_path, stamp).await {
            Ok(()) => self.marker_written.store(true, Ordering::Release),
            Err(e) => {
                error!(error = %e, marker = %self.marker_path.display(), "Failed to write watchdog marker");
            }
        }
    }

    /// Outer-timer evaluation. Returns whether emergency recovery ran.
    pub async fn check(&self) -> bool {
        let contents = match tokio::fs::read_to_string(&self.marker_path).await {
            Ok(contents) => contents,
            Err(e) => {
                // Before the inner timer's first write there is nothing to
                // read. Afterwards a read failure means the marker was
                // deleted or corrupted out from under us: count it as stale.
                if !self.marker_written.load(Ordering::Acquire) {
                    return false;
                }
                if self.fired.swap(true, Ordering::AcqRel) {
                    return false;
                }
                error!(
                    error = %e,
                    marker = %self.marker_path.display(),
                    "Watchdog marker unreadable after a successful write — treating as stall"
                );
                self.emergency_recover().await;
                return true;
            }
        };

        let now_ms = Utc::now().timestamp_millis();
        let Some(age_ms) = staleness_ms(&contents, now_ms) else {
            warn!(marker = %self.marker_path.display(), "Unparseable watchdog marker");
            return false;
        };

        if age_ms <= self.stale_after.as_millis() as i64 {
            // Fresh marker: re-arm for the next stall episode.
            self.fired.store(false, Ordering::Release);
            return false;
        }

        if self.fired.swap(true, Ordering::AcqRel) {
            // Already fired for this episode.
            return false;
        }

        error!(
            stale_secs = age_ms / 1000,
            "Watchdog marker stale — total process stall suspected"
        );
        self.emergency_recover().await;
        true
    }

    /// Emergency recovery: release caches, snapshot + full restart, raw
    /// reinitialization as last resort. Each step's failure is logged and
    /// the sequence continues; only the final fallback failing is fatal
    /// (logged, operator required — never a crash).
    async fn emergency_recover(&self) {
        error!("Emergency recovery started");
        self.gateway.release_cached_models();

        match self.escalator.request_full_restart("watchdog-stall").await {
            Ok(RecoveryOutcome::Recovered) => {
                self.state.reset_failures();
                info!("Emergency recovery complete");
            }
            Ok(RecoveryOutcome::Skipped) => {
                warn!("Emergency restart dropped — another restart in flight");
            }
            Err(e) => {
                error!(error = %e, "Full restart failed — raw reinitialization as last resort");
                let current = self.slot.current().await;
                match current.reinitialize().await {
                    Ok(fresh) => {
                        self.slot.replace(fresh).await;
                        self.state.reset_failures();
                        info!("Last-resort reinitialization succeeded");
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            "FATAL: last-resort reinitialization failed — operator intervention required"
                        );
                    }
                }
            }
        }
    }
}

/// Age of the marker in milliseconds, or `None` if unparseable.
fn staleness_ms(contents: &str, now_ms: i64) -> Option<i64> {
    let stamp: i64 = contents.trim().parse().ok()?;
    Some(now_ms - stamp)
}
