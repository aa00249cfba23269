use serde::Deserialize;
use std::path::Path;

use crate::types::GenerationConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_model_cache_capacity")]
    pub model_cache_capacity: usize,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_model_cache_capacity() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// Display name stripped from the head of AI responses so the bot never
    /// quotes its own name back.
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
    /// Attempts per outbound message before giving up (best-effort delivery).
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            assistant_name: default_assistant_name(),
            send_attempts: default_send_attempts(),
        }
    }
}

fn default_assistant_name() -> String {
    "Amélie".to_string()
}
fn default_send_attempts() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Consecutive unhealthy checks before escalating to a full client restart.
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,
    #[serde(default = "default_memory_warn_mb")]
    pub memory_warn_mb: u64,
    #[serde(default = "default_memory_critical_mb")]
    pub memory_critical_mb: u64,
    #[serde(default = "default_watchdog_inner_secs")]
    pub watchdog_inner_secs: u64,
    #[serde(default = "default_watchdog_outer_secs")]
    pub watchdog_outer_secs: u64,
    #[serde(default = "default_watchdog_stale_secs")]
    pub watchdog_stale_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            check_interval_secs: default_check_interval_secs(),
            failure_limit: default_failure_limit(),
            memory_warn_mb: default_memory_warn_mb(),
            memory_critical_mb: default_memory_critical_mb(),
            watchdog_inner_secs: default_watchdog_inner_secs(),
            watchdog_outer_secs: default_watchdog_outer_secs(),
            watchdog_stale_secs: default_watchdog_stale_secs(),
        }
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}
fn default_check_interval_secs() -> u64 {
    60
}
fn default_failure_limit() -> u32 {
    5
}
fn default_memory_warn_mb() -> u64 {
    1024
}
fn default_memory_critical_mb() -> u64 {
    1536
}
fn default_watchdog_inner_secs() -> u64 {
    30
}
fn default_watchdog_outer_secs() -> u64 {
    60
}
fn default_watchdog_stale_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_threshold")]
    pub threshold: u32,
    #[serde(default = "default_breaker_reset_secs")]
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: default_breaker_threshold(),
            reset_timeout_secs: default_breaker_reset_secs(),
        }
    }
}

fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_reset_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_watchdog_marker_path")]
    pub watchdog_marker_path: String,
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: String,
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            watchdog_marker_path: default_watchdog_marker_path(),
            diagnostics_dir: default_diagnostics_dir(),
            quarantine_dir: default_quarantine_dir(),
        }
    }
}

fn default_watchdog_marker_path() -> String {
    "amelied.watchdog".to_string()
}
fn default_diagnostics_dir() -> String {
    "diagnostics".to_string()
}
fn default_quarantine_dir() -> String {
    "quarantine".to_string()
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
