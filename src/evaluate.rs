//! Threshold evaluation
//!
//! Pure comparison of one metric snapshot against one resolved alert policy.
//! No I/O, no clock, no state - everything time- or store-related lives in the
//! pipeline. One snapshot can yield several candidates (each rule is applied
//! independently), and an absent metric group never yields any: absence means
//! the agent does not monitor that metric, not that its value is zero.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MetricSnapshot;
use crate::config::AlertPolicy;

/// Category of an alerting condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    CpuHigh,
    RamHigh,
    DiskHigh,
    ServiceDown,
    Intrusion,
    SourceInactive,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::CpuHigh => "CPU_HIGH",
            AlertKind::RamHigh => "RAM_HIGH",
            AlertKind::DiskHigh => "DISK_HIGH",
            AlertKind::ServiceDown => "SERVICE_DOWN",
            AlertKind::Intrusion => "INTRUSION",
            AlertKind::SourceInactive => "SOURCE_INACTIVE",
        }
    }

    pub fn parse(s: &str) -> Option<AlertKind> {
        match s {
            "CPU_HIGH" => Some(AlertKind::CpuHigh),
            "RAM_HIGH" => Some(AlertKind::RamHigh),
            "DISK_HIGH" => Some(AlertKind::DiskHigh),
            "SERVICE_DOWN" => Some(AlertKind::ServiceDown),
            "INTRUSION" => Some(AlertKind::Intrusion),
            "SOURCE_INACTIVE" => Some(AlertKind::SourceInactive),
            _ => None,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition that may become an alert, not yet checked against the
/// suppression gate.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub kind: AlertKind,
    pub source_id: String,
    pub host_id: String,
    pub message: String,

    /// Deterministic identity of this exact situation. Per-instance where
    /// instances of the same kind can co-occur (disk paths, service names),
    /// per-source otherwise.
    pub dedup_key: String,
}

impl AlertCandidate {
    fn per_source(kind: AlertKind, snapshot: &MetricSnapshot, message: String) -> Self {
        Self {
            kind,
            source_id: snapshot.source_id.clone(),
            host_id: snapshot.host_id.clone(),
            dedup_key: format!("{kind}:{}", snapshot.source_id),
            message,
        }
    }

    fn per_instance(
        kind: AlertKind,
        snapshot: &MetricSnapshot,
        instance: &str,
        message: String,
    ) -> Self {
        Self {
            kind,
            source_id: snapshot.source_id.clone(),
            host_id: snapshot.host_id.clone(),
            dedup_key: format!("{kind}:{}:{instance}", snapshot.source_id),
            message,
        }
    }
}

/// Evaluate a snapshot against a resolved policy.
///
/// The policy must already have every threshold concrete (see
/// [`AlertPolicy`](crate::config::AlertPolicy) serde defaults); comparisons are
/// strictly greater-than, so a value sitting exactly on the threshold does not
/// alert.
pub fn evaluate(snapshot: &MetricSnapshot, policy: &AlertPolicy) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    if let Some(cpu) = snapshot.cpu_pct
        && cpu > policy.cpu_threshold
    {
        candidates.push(AlertCandidate::per_source(
            AlertKind::CpuHigh,
            snapshot,
            format!(
                "CPU usage is {cpu:.1}%, which exceeds the threshold of {:.1}%",
                policy.cpu_threshold
            ),
        ));
    }

    if let Some(ram) = snapshot.ram_pct
        && ram > policy.ram_threshold
    {
        candidates.push(AlertCandidate::per_source(
            AlertKind::RamHigh,
            snapshot,
            format!(
                "RAM usage is {ram:.1}%, which exceeds the threshold of {:.1}%",
                policy.ram_threshold
            ),
        ));
    }

    if let Some(disks) = &snapshot.disk_pct {
        for (path, pct) in disks {
            if *pct > policy.disk_threshold {
                candidates.push(AlertCandidate::per_instance(
                    AlertKind::DiskHigh,
                    snapshot,
                    path,
                    format!(
                        "Disk usage for {path} is {pct:.1}%, which exceeds the threshold of {:.1}%",
                        policy.disk_threshold
                    ),
                ));
            }
        }
    }

    if policy.service_alerts_enabled
        && let Some(services) = &snapshot.services
    {
        for (name, status) in services {
            if status != "active" {
                candidates.push(AlertCandidate::per_instance(
                    AlertKind::ServiceDown,
                    snapshot,
                    name,
                    format!("Service {name} is {status}"),
                ));
            }
        }
    }

    if policy.intrusion_alerts_enabled
        && let Some(logins) = &snapshot.failed_logins
        && logins.threshold_exceeded
    {
        candidates.push(AlertCandidate::per_source(
            AlertKind::Intrusion,
            snapshot,
            format!(
                "Brute force attack suspected with {} failed login attempts",
                logins.count
            ),
        ));
    }

    candidates
}
