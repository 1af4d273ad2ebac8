//! SQLite store implementation
//!
//! Embedded persistence for small to medium fleets. WAL mode keeps reads
//! cheap while the ingest pool writes; a busy timeout covers lock contention
//! between the pool and the liveness sweep.
//!
//! The snapshot table follows a hybrid layout: aggregate values as typed
//! columns for cheap range scans, the complete snapshot as a JSON payload so
//! the schema survives new metric groups without a migration.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use crate::MetricSnapshot;
use crate::config::AlertPolicy;
use crate::evaluate::AlertKind;

use super::backend::Store;
use super::error::{StoreError, StoreResult};
use super::schema::{AlertFilter, AlertRecord, SourceLiveness};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) a database file and run migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        info!("closing SQLite store");
        self.pool.close().await;
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_alert(row: &sqlx::sqlite::SqliteRow) -> StoreResult<AlertRecord> {
        let kind_str: String = row.get("kind");
        let kind = AlertKind::parse(&kind_str).ok_or_else(|| {
            StoreError::SerializationError(format!("unknown alert kind: {kind_str}"))
        })?;

        Ok(AlertRecord {
            id: row.get("id"),
            source_id: row.get("source_id"),
            host_id: row.get("host_id"),
            kind,
            message: row.get("message"),
            fired_at: Self::millis_to_timestamp(row.get("fired_at")),
            acknowledged: row.get::<i64, _>("acknowledged") != 0,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self))]
    async fn get_policy(&self, source_id: &str) -> StoreResult<AlertPolicy> {
        let row = sqlx::query("SELECT policy FROM sources WHERE source_id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(AlertPolicy::default());
        };

        match row.get::<Option<String>, _>("policy") {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                StoreError::SerializationError(format!("failed to deserialize policy: {e}"))
            }),
            None => Ok(AlertPolicy::default()),
        }
    }

    #[instrument(skip(self, policy))]
    async fn set_policy(&self, source_id: &str, policy: &AlertPolicy) -> StoreResult<()> {
        let json = serde_json::to_string(policy).map_err(|e| {
            StoreError::SerializationError(format!("failed to serialize policy: {e}"))
        })?;

        // A policy can be configured before the source ever reports.
        sqlx::query(
            r#"
            INSERT INTO sources (source_id, host_id, last_seen_at, policy)
            VALUES (?, '', 0, ?)
            ON CONFLICT (source_id) DO UPDATE SET policy = excluded.policy
            "#,
        )
        .bind(source_id)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn list_liveness(&self) -> StoreResult<Vec<SourceLiveness>> {
        let rows = sqlx::query(
            "SELECT source_id, host_id, last_seen_at FROM sources WHERE last_seen_at > 0",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| SourceLiveness {
                source_id: row.get("source_id"),
                host_id: row.get("host_id"),
                last_seen_at: Self::millis_to_timestamp(row.get("last_seen_at")),
            })
            .collect())
    }

    #[instrument(skip(self, at))]
    async fn update_last_seen(
        &self,
        source_id: &str,
        host_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sources (source_id, host_id, last_seen_at)
            VALUES (?, ?, ?)
            ON CONFLICT (source_id) DO UPDATE SET
                host_id = excluded.host_id,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(source_id)
        .bind(host_id)
        .bind(Self::timestamp_to_millis(&at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self, snapshot), fields(source_id = %snapshot.source_id))]
    async fn save_snapshot(&self, snapshot: &MetricSnapshot) -> StoreResult<()> {
        let payload = serde_json::to_string(snapshot).map_err(|e| {
            StoreError::SerializationError(format!("failed to serialize snapshot: {e}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (source_id, observed_at, host_id, cpu_pct, ram_pct, payload)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (source_id, observed_at) DO UPDATE SET
                host_id = excluded.host_id,
                cpu_pct = excluded.cpu_pct,
                ram_pct = excluded.ram_pct,
                payload = excluded.payload
            "#,
        )
        .bind(&snapshot.source_id)
        .bind(Self::timestamp_to_millis(&snapshot.observed_at))
        .bind(&snapshot.host_id)
        .bind(snapshot.cpu_pct)
        .bind(snapshot.ram_pct)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self, since, until))]
    async fn list_history(
        &self,
        source_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<MetricSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM snapshots
            WHERE source_id = ? AND observed_at >= ? AND observed_at <= ?
            ORDER BY observed_at ASC
            "#,
        )
        .bind(source_id)
        .bind(Self::timestamp_to_millis(&since))
        .bind(Self::timestamp_to_millis(&until))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let snapshots: Result<Vec<MetricSnapshot>, StoreError> = rows
            .into_iter()
            .map(|row| {
                let payload: String = row.get("payload");
                serde_json::from_str(&payload).map_err(|e| {
                    StoreError::SerializationError(format!("failed to deserialize snapshot: {e}"))
                })
            })
            .collect();

        let results = snapshots?;
        debug!("history query returned {} snapshots", results.len());
        Ok(results)
    }

    #[instrument(skip(self, record), fields(kind = %record.kind, source_id = %record.source_id))]
    async fn save_alert(&self, record: &AlertRecord) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (source_id, host_id, kind, message, fired_at, acknowledged)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.source_id)
        .bind(&record.host_id)
        .bind(record.kind.as_str())
        .bind(&record.message)
        .bind(Self::timestamp_to_millis(&record.fired_at))
        .bind(record.acknowledged as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    #[instrument(skip(self))]
    async fn acknowledge_alert(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter))]
    async fn list_alerts(&self, filter: &AlertFilter) -> StoreResult<Vec<AlertRecord>> {
        let mut conditions = vec!["fired_at >= ?", "fired_at <= ?"];
        if filter.acknowledged.is_some() {
            conditions.push("acknowledged = ?");
        }

        let sql = format!(
            r#"
            SELECT id, source_id, host_id, kind, message, fired_at, acknowledged
            FROM alerts
            WHERE {}
            ORDER BY fired_at DESC
            "#,
            conditions.join(" AND ")
        );

        let mut query = sqlx::query(&sql)
            .bind(Self::timestamp_to_millis(&filter.since))
            .bind(Self::timestamp_to_millis(&filter.until));

        if let Some(acknowledged) = filter.acknowledged {
            query = query.bind(acknowledged as i64);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let alerts: Result<Vec<AlertRecord>, StoreError> =
            rows.iter().map(Self::row_to_alert).collect();

        let results = alerts?;
        debug!("alert query returned {} records", results.len());
        Ok(results)
    }
}

/// Backend health probe, used by embedders for readiness checks.
impl SqliteStore {
    pub async fn health_check(&self) -> StoreResult<HashMap<String, String>> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let (alerts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        let (sources,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(HashMap::from([
            ("backend".to_string(), "sqlite".to_string()),
            ("alerts".to_string(), alerts.to_string()),
            ("sources".to_string(), sources.to_string()),
        ]))
    }
}
