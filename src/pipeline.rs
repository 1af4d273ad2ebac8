//! Alert pipeline - the orchestrator
//!
//! Wires evaluation, suppression, persistence and notification together for
//! both submitted snapshots and liveness sweeps.
//!
//! ## Per-candidate state machine
//!
//! ```text
//! Received → Evaluated → Admitted → Recorded → Dispatched
//!                      ↘ Suppressed (terminal, no record)
//! ```
//!
//! Ordering rules the rest of the system relies on:
//! - `last_seen` is touched before anything else, so liveness tracking
//!   survives evaluation or notification failures
//! - a record that was saved stays saved; dispatch failures are reported in
//!   the outcome map, never rolled back
//! - only store failures abort processing, and they abort it retryably: the
//!   snapshot is not marked processed and the suppression entry of the
//!   affected candidate is revoked

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::MetricSnapshot;
use crate::config::{AlertPolicy, EngineConfig};
use crate::dedup::DedupGate;
use crate::evaluate::{self, AlertCandidate, AlertKind};
use crate::liveness;
use crate::notify::{ChannelOutcome, Dispatcher};
use crate::store::{AlertRecord, Store, StoreError};

/// Errors surfaced to the pipeline's caller.
///
/// Channel failures never show up here - they live in the per-candidate
/// outcome maps. Policy resolution failures degrade to defaults with a
/// warning. Only malformed input and store unavailability abort processing.
#[derive(Debug)]
pub enum PipelineError {
    /// Malformed snapshot, rejected before evaluation.
    Validation(String),

    /// Persistence unavailable; the submission is retryable.
    Store(StoreError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Validation(msg) => write!(f, "invalid snapshot: {}", msg),
            PipelineError::Store(err) => write!(f, "store failure: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        PipelineError::Store(err)
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// A live suppression entry existed; nothing was recorded or sent.
    Suppressed,

    /// Recorded and handed to the dispatcher.
    Recorded {
        alert_id: i64,
        channels: HashMap<String, ChannelOutcome>,
    },
}

#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    pub kind: AlertKind,
    pub source_id: String,
    pub dedup_key: String,
    pub disposition: Disposition,
}

/// Full account of one submission or sweep.
#[derive(Debug, Clone, Default)]
pub struct ProcessingReport {
    pub outcomes: Vec<CandidateOutcome>,
}

impl ProcessingReport {
    pub fn recorded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.disposition, Disposition::Recorded { .. }))
            .count()
    }

    pub fn suppressed(&self) -> usize {
        self.outcomes.len() - self.recorded()
    }
}

pub struct AlertPipeline {
    store: Arc<dyn Store>,
    gate: DedupGate,
    dispatcher: Dispatcher,
    config: EngineConfig,
}

impl AlertPipeline {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher, config: EngineConfig) -> Self {
        Self {
            store,
            gate: DedupGate::new(),
            dispatcher,
            config,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process one metrics report end to end.
    #[instrument(skip(self, snapshot), fields(source_id = %snapshot.source_id))]
    pub async fn submit(&self, snapshot: &MetricSnapshot) -> Result<ProcessingReport, PipelineError> {
        validate(snapshot)?;

        // Liveness first, unconditionally. A source that reports is alive even
        // if everything downstream fails.
        self.store
            .update_last_seen(&snapshot.source_id, &snapshot.host_id, Utc::now())
            .await?;

        self.store.save_snapshot(snapshot).await?;

        let policy = match self.store.get_policy(&snapshot.source_id).await {
            Ok(policy) => policy,
            Err(e) => {
                warn!("policy resolution failed for {}, using defaults: {e}", snapshot.source_id);
                AlertPolicy::default()
            }
        };

        let candidates = evaluate::evaluate(snapshot, &policy);
        debug!("evaluation produced {} candidate(s)", candidates.len());

        self.process_candidates(candidates).await
    }

    /// Run one liveness sweep: every source silent for longer than the
    /// configured threshold becomes a `SOURCE_INACTIVE` candidate flowing
    /// through the same gate and dispatcher as real-time alerts.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<ProcessingReport, PipelineError> {
        let rows = self.store.list_liveness().await?;
        let candidates = liveness::sweep(&rows, now, self.config.inactivity_threshold());

        if !candidates.is_empty() {
            debug!("liveness sweep flagged {} source(s)", candidates.len());
        }

        self.process_candidates(candidates).await
    }

    /// Reclaim expired suppression entries. Purely memory hygiene; a missed
    /// purge never admits a key early.
    pub fn purge_suppressions(&self, now: DateTime<Utc>) -> usize {
        self.gate.purge_expired(now)
    }

    async fn process_candidates(
        &self,
        candidates: Vec<AlertCandidate>,
    ) -> Result<ProcessingReport, PipelineError> {
        let mut report = ProcessingReport::default();

        for candidate in candidates {
            let now = Utc::now();

            if !self
                .gate
                .admit(&candidate.dedup_key, self.config.suppression_window(), now)
            {
                debug!("{}: suppressed", candidate.dedup_key);
                report.outcomes.push(CandidateOutcome {
                    kind: candidate.kind,
                    source_id: candidate.source_id,
                    dedup_key: candidate.dedup_key,
                    disposition: Disposition::Suppressed,
                });
                continue;
            }

            let mut record = AlertRecord::from_candidate(&candidate, now);
            let alert_id = match self.store.save_alert(&record).await {
                Ok(id) => id,
                Err(e) => {
                    // The firing never happened; let a retry through the gate.
                    self.gate.revoke(&candidate.dedup_key);
                    return Err(e.into());
                }
            };
            record.id = alert_id;

            let channels = self.dispatcher.dispatch(&record).await;

            report.outcomes.push(CandidateOutcome {
                kind: candidate.kind,
                source_id: candidate.source_id,
                dedup_key: candidate.dedup_key,
                disposition: Disposition::Recorded { alert_id, channels },
            });
        }

        Ok(report)
    }
}

fn validate(snapshot: &MetricSnapshot) -> Result<(), PipelineError> {
    if snapshot.source_id.is_empty() {
        return Err(PipelineError::Validation("source_id is empty".to_string()));
    }
    if snapshot.host_id.is_empty() {
        return Err(PipelineError::Validation("host_id is empty".to_string()));
    }

    for (field, value) in [("cpu_pct", snapshot.cpu_pct), ("ram_pct", snapshot.ram_pct)] {
        if let Some(value) = value
            && !value.is_finite()
        {
            return Err(PipelineError::Validation(format!(
                "{field} is not a finite number"
            )));
        }
    }

    if let Some(disks) = &snapshot.disk_pct
        && let Some((path, _)) = disks.iter().find(|(_, pct)| !pct.is_finite())
    {
        return Err(PipelineError::Validation(format!(
            "disk_pct for {path} is not a finite number"
        )));
    }

    Ok(())
}
