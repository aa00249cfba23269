//! The resilience supervisor.
//!
//! Cooperating components that decide whether the relay is actually alive
//! and escalate through increasingly invasive recovery when it is not:
//! heartbeat, liveness probe, reconnection escalator, and the dual-timer
//! watchdog cross-check. All of them communicate through one explicit
//! [`SupervisorState`] instance rather than globals.

pub mod diagnostics;
pub mod escalator;
pub mod heartbeat;
pub mod liveness;
pub mod watchdog;

pub use diagnostics::DiagnosticRecorder;
pub use escalator::ReconnectionEscalator;
pub use heartbeat::HeartbeatTimer;
pub use liveness::{LivenessProbe, LivenessSignals};
pub use watchdog::WatchdogCrossCheck;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::traits::Transport;

/// Swappable handle to the current transport client. Normal operations
/// clone the inner `Arc` for the duration of one call; only restart and
/// reinitialization actions write the slot.
#[derive(Clone)]
pub struct TransportSlot {
    inner: Arc<RwLock<Arc<dyn Transport>>>,
}

impl TransportSlot {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(transport)),
        }
    }

    pub async fn current(&self) -> Arc<dyn Transport> {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, transport: Arc<dyn Transport>) {
        *self.inner.write().await = transport;
    }
}

/// Shared mutable supervisor state. Counters reset to zero are idempotent,
/// so redundant recovery triggers are harmless; the restart guard is the
/// one piece that must serialize.
pub struct SupervisorState {
    started_at: Instant,
    last_heartbeat: Mutex<Instant>,
    heartbeat_count: AtomicU64,
    consecutive_failures: AtomicU32,
    restart_in_flight: AtomicBool,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            last_heartbeat: Mutex::new(Instant::now()),
            heartbeat_count: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            restart_in_flight: AtomicBool::new(false),
        }
    }

    pub fn record_heartbeat(&self) {
        *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn increment_beats(&self) -> u64 {
        self.heartbeat_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn beat_count(&self) -> u64 {
        self.heartbeat_count.load(Ordering::Relaxed)
    }

    pub fn heartbeat_within(&self, window: Duration) -> bool {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
            <= window
    }

    pub fn last_heartbeat_secs_ago(&self) -> u64 {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
            .as_secs()
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn increment_failures(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reset the failure counter, returning the prior value.
    pub fn reset_failures(&self) -> u32 {
        self.consecutive_failures.swap(0, Ordering::Relaxed)
    }

    /// Claim the single restart permit. `false` means one is in flight and
    /// the caller must drop its request.
    pub fn try_begin_restart(&self) -> bool {
        self.restart_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_restart(&self) {
        self.restart_in_flight.store(false, Ordering::Release);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> SupervisorSnapshot {
        SupervisorSnapshot {
            uptime_secs: self.uptime_secs(),
            heartbeat_count: self.beat_count(),
            consecutive_failures: self.failures(),
            last_heartbeat_secs_ago: self.last_heartbeat_secs_ago(),
            restart_in_flight: self.restart_in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of supervisor state, serializable for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorSnapshot {
    pub uptime_secs: u64,
    pub heartbeat_count: u64,
    pub consecutive_failures: u32,
    pub last_heartbeat_secs_ago: u64,
    pub restart_in_flight: bool,
}

/// Resident set size of this process in MB, if the platform exposes it.
pub(crate) fn read_rss_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
                return Some(kb / 1024);
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
