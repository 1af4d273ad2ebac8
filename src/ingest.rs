//! Snapshot intake
//!
//! The feed pushes snapshots into an mpsc channel; this actor pulls them off
//! and runs each through the pipeline on its own task, bounded by a semaphore
//! so a burst of reports cannot spawn unbounded work. Processing order across
//! sources is not guaranteed - the suppression gate is the synchronization
//! point that matters.
//!
//! Shutdown is graceful: the actor stops accepting new snapshots, then waits
//! for every in-flight submission (including its channel dispatches) to finish
//! or time out before exiting.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, instrument, trace, warn};

use crate::MetricSnapshot;
use crate::pipeline::AlertPipeline;

/// Commands that can be sent to the IngestActor
#[derive(Debug)]
pub enum IngestCommand {
    /// Gracefully shut down, draining in-flight submissions
    Shutdown,
}

pub struct IngestActor {
    pipeline: Arc<AlertPipeline>,

    /// Snapshot feed
    snapshot_rx: mpsc::Receiver<MetricSnapshot>,

    /// Command receiver
    command_rx: mpsc::Receiver<IngestCommand>,

    /// Bounds concurrent submissions
    limiter: Arc<Semaphore>,

    max_in_flight: usize,
}

impl IngestActor {
    pub fn new(
        pipeline: Arc<AlertPipeline>,
        snapshot_rx: mpsc::Receiver<MetricSnapshot>,
        command_rx: mpsc::Receiver<IngestCommand>,
    ) -> Self {
        let max_in_flight = pipeline.config().max_in_flight.max(1);
        Self {
            pipeline,
            snapshot_rx,
            command_rx,
            limiter: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting ingest actor ({} concurrent submissions)",
            self.max_in_flight
        );

        loop {
            tokio::select! {
                snapshot = self.snapshot_rx.recv() => {
                    match snapshot {
                        Some(snapshot) => self.spawn_submission(snapshot).await,
                        None => {
                            warn!("snapshot channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        IngestCommand::Shutdown => {
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

        // Drain: every permit held by an in-flight submission must come back
        // before the actor exits, so recorded alerts finish dispatching.
        let _ = self
            .limiter
            .acquire_many(self.max_in_flight as u32)
            .await
            .expect("ingest semaphore closed");

        debug!("ingest actor stopped");
    }

    async fn spawn_submission(&self, snapshot: MetricSnapshot) {
        let permit = self
            .limiter
            .clone()
            .acquire_owned()
            .await
            .expect("ingest semaphore closed");

        let pipeline = self.pipeline.clone();

        tokio::spawn(async move {
            let source_id = snapshot.source_id.clone();

            match pipeline.submit(&snapshot).await {
                Ok(report) => {
                    trace!(
                        "{source_id}: processed ({} recorded, {} suppressed)",
                        report.recorded(),
                        report.suppressed()
                    );
                }
                Err(e) => {
                    // retryable by the feed; the snapshot was not marked processed
                    error!("{source_id}: submission failed: {e}");
                }
            }

            drop(permit);
        });
    }
}

/// Handle for feeding and controlling the IngestActor
#[derive(Clone)]
pub struct IngestHandle {
    snapshot_tx: mpsc::Sender<MetricSnapshot>,
    command_tx: mpsc::Sender<IngestCommand>,
}

impl IngestHandle {
    /// Spawn a new ingest actor over the given pipeline.
    pub fn spawn(pipeline: Arc<AlertPipeline>) -> Self {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(8);

        let actor = IngestActor::new(pipeline, snapshot_rx, command_rx);
        tokio::spawn(actor.run());

        Self {
            snapshot_tx,
            command_tx,
        }
    }

    /// Queue one snapshot for processing.
    ///
    /// Applies backpressure when the feed outruns the pool; fails only after
    /// shutdown.
    pub async fn submit(&self, snapshot: MetricSnapshot) -> anyhow::Result<()> {
        self.snapshot_tx
            .send(snapshot)
            .await
            .map_err(|_| anyhow::anyhow!("ingest actor is no longer running"))
    }

    /// Shutdown the ingest actor, draining in-flight submissions.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(IngestCommand::Shutdown).await;
    }
}
