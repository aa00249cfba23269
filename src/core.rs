//! Composition root: builds the gateway and the supervisor around one
//! transport client and runs the relay loop until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::activity::ActivityJournal;
use crate::config::AppConfig;
use crate::gateway::{AiGateway, CircuitBreaker};
use crate::providers::GeminiBackend;
use crate::quarantine::QuarantineStore;
use crate::relay::Relay;
use crate::supervisor::{
    DiagnosticRecorder, HeartbeatTimer, LivenessProbe, ReconnectionEscalator, SupervisorState,
    TransportSlot, WatchdogCrossCheck,
};
use crate::traits::Transport;
use crate::transport::{self, StdioTransport};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        model = %config.provider.generation.model,
        "Starting relay daemon"
    );

    // AI side: backend, quarantine, gateway.
    let backend = Arc::new(GeminiBackend::new(
        &config.provider.api_key,
        &config.provider.base_url,
    ));
    let quarantine = Arc::new(QuarantineStore::new(&config.storage.quarantine_dir));
    let breaker = CircuitBreaker::new(
        config.breaker.threshold,
        Duration::from_secs(config.breaker.reset_timeout_secs),
    );
    let gateway = Arc::new(AiGateway::new(
        backend,
        config.provider.generation.clone(),
        config.provider.model_cache_capacity,
        breaker,
        Some(quarantine),
    ));

    // Transport side.
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let client: Arc<dyn Transport> =
        Arc::new(StdioTransport::new(&config.transport.assistant_name));
    transport::spawn_stdin_reader(inbound_tx);
    let slot = TransportSlot::new(client);

    // Supervisor.
    let journal = Arc::new(ActivityJournal::new());
    let state = Arc::new(SupervisorState::new());
    let probe = Arc::new(LivenessProbe::new(slot.clone(), journal.clone()));
    let recorder = Arc::new(DiagnosticRecorder::new(
        &config.storage.diagnostics_dir,
        state.clone(),
        journal.clone(),
    ));

    let escalator = Arc::new(ReconnectionEscalator::new(
        state.clone(),
        probe.clone(),
        slot.clone(),
        recorder,
        gateway.clone(),
        config.supervisor.failure_limit,
        Duration::from_secs(config.supervisor.check_interval_secs),
    ));
    escalator.clone().spawn();

    let heartbeat = Arc::new(HeartbeatTimer::new(
        Duration::from_secs(config.supervisor.heartbeat_interval_secs),
        probe,
        journal.clone(),
        state.clone(),
        gateway.clone(),
        escalator.clone(),
        config.supervisor.memory_warn_mb,
        config.supervisor.memory_critical_mb,
    ));
    heartbeat.start();

    let watchdog = Arc::new(WatchdogCrossCheck::new(
        &config.storage.watchdog_marker_path,
        Duration::from_secs(config.supervisor.watchdog_inner_secs),
        Duration::from_secs(config.supervisor.watchdog_outer_secs),
        Duration::from_secs(config.supervisor.watchdog_stale_secs),
        escalator,
        gateway.clone(),
        slot.clone(),
        state.clone(),
    ));
    watchdog.spawn();

    let relay = Relay::new(
        gateway,
        slot,
        journal,
        Duration::from_secs(config.provider.request_timeout_secs),
        config.transport.send_attempts,
    );

    tokio::select! {
        _ = relay.run(inbound_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    heartbeat.stop();
    info!(snapshot = ?state.snapshot(), "Relay daemon stopped");
    Ok(())
}
