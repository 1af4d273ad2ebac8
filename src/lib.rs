pub mod config;
pub mod dedup;
pub mod evaluate;
pub mod ingest;
pub mod liveness;
pub mod notify;
pub mod pipeline;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One metrics report from a monitored source.
///
/// Every metric group is optional - collection can be disabled per-metric on
/// the agent side, and an absent group means "not monitored", never "zero".
/// Maps are ordered so evaluation walks them deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub source_id: String,
    pub host_id: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub cpu_pct: Option<f64>,
    #[serde(default)]
    pub ram_pct: Option<f64>,
    /// Disk usage percentage per mount path.
    #[serde(default)]
    pub disk_pct: Option<BTreeMap<String, f64>>,
    /// Traffic rates per interface.
    #[serde(default)]
    pub net: Option<BTreeMap<String, InterfaceRates>>,
    /// Unit status per service name ("active" means healthy).
    #[serde(default)]
    pub services: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub failed_logins: Option<FailedLogins>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRates {
    pub in_rate: f64,
    pub out_rate: f64,
}

/// Failed-login summary reported by the agent. The agent applies its own
/// threshold; the evaluator only trusts `threshold_exceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailedLogins {
    pub count: u32,
    pub threshold_exceeded: bool,
}

impl MetricSnapshot {
    /// Minimal snapshot with every metric group absent.
    pub fn empty(
        source_id: impl Into<String>,
        host_id: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            host_id: host_id.into(),
            observed_at,
            cpu_pct: None,
            ram_pct: None,
            disk_pct: None,
            net: None,
            services: None,
            failed_logins: None,
        }
    }
}
