//! Ingestion driver
//!
//! The only writer of the session store. It pulls batches from a
//! [`SampleSource`] and applies them one at a time through the query facade,
//! and periodically expires channels that stopped reporting.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{SampleBatch, SampleSource};
use crate::error::SourceError;
use crate::query::ScopeServer;

/// How often channel liveness is re-evaluated
const LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// Counters reported when the driver stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Batches received from the source
    pub batches: u64,
    /// Samples accepted by the store
    pub samples: u64,
}

/// Handle to a running ingestion task
pub struct IngestDriver {
    cancel: CancellationToken,
    handle: JoinHandle<IngestStats>,
}

impl IngestDriver {
    /// Start `source` and feed everything it produces into `server`
    ///
    /// The store adopts the source's sample rate. Fails if the rate is not
    /// positive, or if the store already recorded channels at another rate.
    pub fn spawn<S: SampleSource>(server: ScopeServer, source: S) -> Result<Self, SourceError> {
        server.use_source_rate(source.sample_rate())?;

        let cancel = CancellationToken::new();
        let rx = source.spawn(server.paused_signal(), cancel.child_token());
        let handle = tokio::spawn(run(server, rx, cancel.clone()));
        Ok(Self { cancel, handle })
    }

    /// Token that stops both the driver and its source
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check if the ingestion task has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop ingestion and wait for the task to end
    pub async fn stop(self) -> IngestStats {
        self.cancel.cancel();
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Ingestion task ended abnormally: {e}");
                IngestStats::default()
            }
        }
    }
}

async fn run(
    server: ScopeServer,
    mut rx: mpsc::Receiver<SampleBatch>,
    cancel: CancellationToken,
) -> IngestStats {
    let mut stats = IngestStats::default();
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Ingestion started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = liveness.tick() => {
                server.refresh_liveness();
            }
            batch = rx.recv() => match batch {
                Some(batch) => {
                    stats.batches += 1;
                    stats.samples += server.ingest(&batch) as u64;
                }
                None => {
                    tracing::info!("Sample source closed");
                    break;
                }
            },
        }
    }

    tracing::info!(
        "Ingestion stopped after {} batch(es), {} sample(s)",
        stats.batches,
        stats.samples
    );
    stats
}
