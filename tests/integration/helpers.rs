//! Helper functions for integration tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use vigil::MetricSnapshot;
use vigil::config::EngineConfig;
use vigil::notify::{ChannelOutcome, Dispatcher, NotificationChannel};
use vigil::pipeline::AlertPipeline;
use vigil::store::AlertRecord;
use vigil::store::memory::MemoryStore;

/// Install a subscriber so `RUST_LOG` controls test output. Safe to call from
/// every test; only the first install wins.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test channel that records every delivered alert and returns a fixed
/// outcome, optionally after a delay.
pub struct ScriptedChannel {
    pub channel_name: &'static str,
    pub enabled: bool,
    pub outcome: ChannelOutcome,
    pub delay: Duration,
    pub delivered: Arc<Mutex<Vec<AlertRecord>>>,
}

impl ScriptedChannel {
    pub fn sending(name: &'static str) -> (Self, Arc<Mutex<Vec<AlertRecord>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                channel_name: name,
                enabled: true,
                outcome: ChannelOutcome::Sent,
                delay: Duration::ZERO,
                delivered: delivered.clone(),
            },
            delivered,
        )
    }

    pub fn failing(name: &'static str, reason: &str) -> Self {
        Self {
            channel_name: name,
            enabled: true,
            outcome: ChannelOutcome::Failed(reason.to_string()),
            delay: Duration::ZERO,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn stalled(name: &'static str, delay: Duration) -> Self {
        Self {
            channel_name: name,
            enabled: true,
            outcome: ChannelOutcome::Sent,
            delay,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn disabled(name: &'static str) -> Self {
        Self {
            channel_name: name,
            enabled: false,
            outcome: ChannelOutcome::Sent,
            delay: Duration::ZERO,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl NotificationChannel for ScriptedChannel {
    fn name(&self) -> &str {
        self.channel_name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, record: &AlertRecord) -> ChannelOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.delivered.lock().unwrap().push(record.clone());
        self.outcome.clone()
    }
}

/// Engine config with a short suppression window so expiry is testable.
pub fn fast_config() -> EngineConfig {
    serde_json::from_str(
        r#"{
            "suppression_window_secs": 1,
            "dispatch_timeout_secs": 1
        }"#,
    )
    .unwrap()
}

pub fn build_pipeline(
    store: Arc<MemoryStore>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    config: EngineConfig,
) -> Arc<AlertPipeline> {
    let timeout = config.dispatch_timeout();
    Arc::new(AlertPipeline::new(
        store,
        Dispatcher::new(channels, timeout),
        config,
    ))
}

pub fn snapshot_with_cpu(source_id: &str, cpu_pct: f64) -> MetricSnapshot {
    let mut snapshot =
        MetricSnapshot::empty(source_id, format!("{source_id}.example.org"), Utc::now());
    snapshot.cpu_pct = Some(cpu_pct);
    snapshot
}

pub fn snapshot_with_disks(source_id: &str, disks: &[(&str, f64)]) -> MetricSnapshot {
    let mut snapshot =
        MetricSnapshot::empty(source_id, format!("{source_id}.example.org"), Utc::now());
    snapshot.disk_pct = Some(
        disks
            .iter()
            .map(|(path, pct)| (path.to_string(), *pct))
            .collect::<BTreeMap<_, _>>(),
    );
    snapshot
}
