//! In-memory store (no persistence)
//!
//! Full [`Store`] implementation over in-process maps. Useful for:
//! - Testing without database dependencies
//! - Deployments that accept losing history on restart
//!
//! Snapshot history is capped per source; when the buffer is full, the oldest
//! snapshots are evicted.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::MetricSnapshot;
use crate::config::AlertPolicy;

use super::backend::Store;
use super::error::StoreResult;
use super::schema::{AlertFilter, AlertRecord, SourceLiveness};

/// Maximum snapshots to keep in memory per source
const MAX_SNAPSHOTS_PER_SOURCE: usize = 1000;

#[derive(Default)]
struct Inner {
    policies: HashMap<String, AlertPolicy>,
    liveness: HashMap<String, SourceLiveness>,
    snapshots: HashMap<String, VecDeque<MetricSnapshot>>,
    alerts: Vec<AlertRecord>,
    next_alert_id: i64,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_alert_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_policy(&self, source_id: &str) -> StoreResult<AlertPolicy> {
        let inner = self.inner.read().await;
        Ok(inner.policies.get(source_id).cloned().unwrap_or_default())
    }

    async fn set_policy(&self, source_id: &str, policy: &AlertPolicy) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.policies.insert(source_id.to_string(), policy.clone());
        Ok(())
    }

    async fn list_liveness(&self) -> StoreResult<Vec<SourceLiveness>> {
        let inner = self.inner.read().await;
        Ok(inner.liveness.values().cloned().collect())
    }

    async fn update_last_seen(
        &self,
        source_id: &str,
        host_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.liveness.insert(
            source_id.to_string(),
            SourceLiveness {
                source_id: source_id.to_string(),
                host_id: host_id.to_string(),
                last_seen_at: at,
            },
        );
        Ok(())
    }

    async fn save_snapshot(&self, snapshot: &MetricSnapshot) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let buffer = inner
            .snapshots
            .entry(snapshot.source_id.clone())
            .or_default();

        buffer.push_back(snapshot.clone());
        if buffer.len() > MAX_SNAPSHOTS_PER_SOURCE {
            buffer.pop_front();
        }
        Ok(())
    }

    async fn list_history(
        &self,
        source_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSnapshot>> {
        debug!("querying in-memory history for {source_id}");

        let inner = self.inner.read().await;
        let mut snapshots: Vec<MetricSnapshot> = inner
            .snapshots
            .get(source_id)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|s| s.observed_at >= since && s.observed_at <= until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        snapshots.sort_by_key(|s| s.observed_at);
        Ok(snapshots)
    }

    async fn save_alert(&self, record: &AlertRecord) -> StoreResult<i64> {
        let mut inner = self.inner.write().await;
        let id = inner.next_alert_id;
        inner.next_alert_id += 1;

        inner.alerts.push(AlertRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    async fn acknowledge_alert(&self, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<AlertRecord>> {
        let inner = self.inner.read().await;
        let mut alerts: Vec<AlertRecord> = inner
            .alerts
            .iter()
            .filter(|a| a.fired_at >= filter.since && a.fired_at <= filter.until)
            .filter(|a| {
                filter
                    .acknowledged
                    .is_none_or(|wanted| a.acknowledged == wanted)
            })
            .cloned()
            .collect();

        alerts.sort_by(|a, b| b.fired_at.cmp(&a.fired_at));
        Ok(alerts)
    }
}
