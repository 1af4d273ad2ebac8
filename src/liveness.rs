//! Liveness monitoring
//!
//! A source that stops reporting is itself an alerting condition. The sweep is
//! a pure function over the stored last-seen rows; the actor below drives it
//! on a fixed cadence and reuses the pipeline, so inactivity candidates pass
//! through the same suppression gate and dispatcher as real-time alerts.
//!
//! Recovery is implicit: once the source reports again, `last_seen_at`
//! advances and subsequent sweeps stop emitting the candidate. No explicit
//! "back online" alert is produced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, instrument, trace, warn};

use crate::evaluate::{AlertCandidate, AlertKind};
use crate::pipeline::{AlertPipeline, PipelineError, ProcessingReport};
use crate::store::SourceLiveness;

/// Find sources whose silence exceeds the threshold, as of `now`.
///
/// The comparison is strictly greater-than: a source silent for exactly the
/// threshold is still considered alive.
pub fn sweep(
    rows: &[SourceLiveness],
    now: DateTime<Utc>,
    inactivity_threshold: Duration,
) -> Vec<AlertCandidate> {
    let threshold =
        chrono::TimeDelta::from_std(inactivity_threshold).unwrap_or(chrono::TimeDelta::MAX);

    rows.iter()
        .filter(|row| now - row.last_seen_at > threshold)
        .map(|row| {
            let silent_for = (now - row.last_seen_at).num_seconds();
            AlertCandidate {
                kind: AlertKind::SourceInactive,
                source_id: row.source_id.clone(),
                host_id: row.host_id.clone(),
                message: format!(
                    "Source has not reported for {silent_for}s (last seen {})",
                    row.last_seen_at.to_rfc3339()
                ),
                dedup_key: format!("{}:{}", AlertKind::SourceInactive, row.source_id),
            }
        })
        .collect()
}

/// Commands that can be sent to the LivenessMonitorActor
#[derive(Debug)]
pub enum LivenessCommand {
    /// Trigger an immediate sweep (bypassing the interval timer)
    SweepNow {
        respond_to: oneshot::Sender<Result<ProcessingReport, PipelineError>>,
    },

    /// Gracefully shut down the monitor
    Shutdown,
}

/// Actor that runs the liveness sweep on a fixed cadence.
///
/// Runs independently of snapshot ingestion; neither ever cancels the other.
/// The timer tick also purges expired suppression entries - piggybacking the
/// gate's memory hygiene on a loop that already wakes up periodically.
pub struct LivenessMonitorActor {
    pipeline: Arc<AlertPipeline>,

    /// Command receiver
    command_rx: mpsc::Receiver<LivenessCommand>,

    /// Sweep cadence
    interval_duration: Duration,
}

impl LivenessMonitorActor {
    pub fn new(
        pipeline: Arc<AlertPipeline>,
        command_rx: mpsc::Receiver<LivenessCommand>,
    ) -> Self {
        let interval_duration = pipeline.config().sweep_interval();
        Self {
            pipeline,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting liveness monitor (cadence: {}s)",
            self.interval_duration.as_secs()
        );

        let mut ticker = interval(self.interval_duration);
        // the immediate first tick would sweep before any source reported
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();

                    match self.pipeline.run_sweep(now).await {
                        Ok(report) => {
                            if !report.outcomes.is_empty() {
                                debug!(
                                    "sweep complete: {} recorded, {} suppressed",
                                    report.recorded(),
                                    report.suppressed()
                                );
                            }
                        }
                        Err(e) => {
                            // retried on the next tick
                            error!("liveness sweep failed: {e}");
                        }
                    }

                    let purged = self.pipeline.purge_suppressions(now);
                    if purged > 0 {
                        trace!("purged {purged} expired suppression entries");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        LivenessCommand::SweepNow { respond_to } => {
                            debug!("received SweepNow command");
                            let result = self.pipeline.run_sweep(Utc::now()).await;
                            let _ = respond_to.send(result);
                        }

                        LivenessCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // Command channel closed - exit
                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("liveness monitor stopped");
    }
}

/// Handle for controlling the LivenessMonitorActor
#[derive(Clone)]
pub struct LivenessHandle {
    sender: mpsc::Sender<LivenessCommand>,
}

impl LivenessHandle {
    /// Spawn a new liveness monitor over the given pipeline.
    pub fn spawn(pipeline: Arc<AlertPipeline>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = LivenessMonitorActor::new(pipeline, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a sweep immediately and return its report.
    pub async fn sweep_now(&self) -> Option<Result<ProcessingReport, PipelineError>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LivenessCommand::SweepNow { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the liveness monitor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(LivenessCommand::Shutdown).await;
    }
}
