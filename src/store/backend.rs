//! Store trait definition
//!
//! The narrow contract between the alert engine and whatever persists its
//! state. Implementations must be `Send + Sync`; they are shared across the
//! ingest pool and the liveness actor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::MetricSnapshot;
use crate::config::AlertPolicy;

use super::error::StoreResult;
use super::schema::{AlertFilter, AlertRecord, SourceLiveness};

#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve the alert policy for a source.
    ///
    /// A source without a stored policy resolves to [`AlertPolicy::default`];
    /// only genuine backend failures return an error (the pipeline degrades
    /// those to defaults with a warning, they are never fatal).
    async fn get_policy(&self, source_id: &str) -> StoreResult<AlertPolicy>;

    /// Replace the stored policy for a source.
    async fn set_policy(&self, source_id: &str, policy: &AlertPolicy) -> StoreResult<()>;

    /// All known sources with their last report time.
    async fn list_liveness(&self) -> StoreResult<Vec<SourceLiveness>>;

    /// Record that a source reported at `at`. Upserts: an unknown source is
    /// registered on its first report.
    async fn update_last_seen(
        &self,
        source_id: &str,
        host_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Persist a snapshot for historical queries.
    async fn save_snapshot(&self, snapshot: &MetricSnapshot) -> StoreResult<()>;

    /// Snapshots for one source within a time range, oldest first.
    async fn list_history(
        &self,
        source_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSnapshot>>;

    /// Persist a fired alert, returning the assigned id.
    async fn save_alert(&self, record: &AlertRecord) -> StoreResult<i64>;

    /// Mark an alert acknowledged. Returns `false` if no such alert exists.
    async fn acknowledge_alert(&self, id: i64) -> StoreResult<bool>;

    /// Alerts matching the filter, newest first.
    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<AlertRecord>>;
}
