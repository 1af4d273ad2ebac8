use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "memory")]
    Memory,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./vigil.db")
}

/// Per-source alert thresholds.
///
/// Each field is individually defaulted, so a source row that only overrides
/// `cpu_threshold` still resolves every other field to a concrete value. The
/// evaluator never sees an absent threshold.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AlertPolicy {
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,
    #[serde(default = "default_ram_threshold")]
    pub ram_threshold: f64,
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold: f64,
    #[serde(default = "default_enabled")]
    pub service_alerts_enabled: bool,
    #[serde(default = "default_enabled")]
    pub intrusion_alerts_enabled: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            cpu_threshold: default_cpu_threshold(),
            ram_threshold: default_ram_threshold(),
            disk_threshold: default_disk_threshold(),
            service_alerts_enabled: true,
            intrusion_alerts_enabled: true,
        }
    }
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_ram_threshold() -> f64 {
    85.0
}

fn default_disk_threshold() -> f64 {
    90.0
}

fn default_enabled() -> bool {
    true
}

/// Engine-wide tuning knobs, all with serde defaults so an empty config file
/// yields a working engine.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct EngineConfig {
    /// Seconds a fired dedup key suppresses repeat notifications.
    #[serde(default = "default_suppression_window_secs")]
    pub suppression_window_secs: u64,

    /// Seconds between liveness sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Seconds of silence before a source counts as inactive.
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,

    /// Per-channel send timeout in seconds.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// Snapshots processed concurrently by the ingest pool.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default)]
    pub channels: ChannelsConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suppression_window_secs: default_suppression_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            max_in_flight: default_max_in_flight(),
            channels: ChannelsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn suppression_window(&self) -> Duration {
        Duration::from_secs(self.suppression_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

fn default_suppression_window_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_inactivity_threshold_secs() -> u64 {
    600
}

fn default_dispatch_timeout_secs() -> u64 {
    10
}

fn default_max_in_flight() -> usize {
    8
}

/// Notification channel configuration. A channel that is absent is simply not
/// constructed; a channel that is present but `enabled = false` still shows up
/// in dispatch outcome maps as `Disabled`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ChannelsConfig {
    pub email: Option<EmailConfig>,
    pub chat: Option<ChatConfig>,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
}

fn default_smtp_port() -> u16 {
    25
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Full bot endpoint URL, token included.
    pub api_url: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url: String,
}

pub fn read_config_file(path: &str) -> anyhow::Result<EngineConfig> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
