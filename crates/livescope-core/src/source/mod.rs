//! Sample sources
//!
//! A sample source is the producer side of the store: it emits one
//! [`SampleBatch`] per sample tick and honours a paused flag owned by the
//! query facade. The [`IngestDriver`] is the single task that moves batches
//! from a source into the store.

mod driver;
mod simulated;

pub use driver::{IngestDriver, IngestStats};
pub use simulated::{SimulatedChannel, SimulatedSource, DEFAULT_SOURCE_BUFFER};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::clock::Millis;

/// One channel's value in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSample {
    /// Channel id
    pub channel_id: String,
    /// Sampled value
    pub value: f64,
}

impl ChannelSample {
    /// Create a sample
    pub fn new(channel_id: impl Into<String>, value: f64) -> Self {
        Self {
            channel_id: channel_id.into(),
            value,
        }
    }

    /// Check whether the entry can be stored
    pub fn is_valid(&self) -> bool {
        !self.channel_id.trim().is_empty() && self.value.is_finite()
    }
}

/// Values of several channels sampled at the same instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    /// Sample time
    pub time: Millis,
    /// Per-channel values
    pub data: Vec<ChannelSample>,
}

impl SampleBatch {
    /// Create a batch
    pub fn new(time: Millis, data: Vec<ChannelSample>) -> Self {
        Self { time, data }
    }

    /// Entries that can be stored, as `(channel id, value)` pairs
    ///
    /// Entries with an empty id or a non-finite value are dropped, as are
    /// repeated ids after their first occurrence.
    pub fn valid_entries(&self) -> Vec<(&str, f64)> {
        let mut seen = HashSet::with_capacity(self.data.len());
        let mut entries = Vec::with_capacity(self.data.len());

        for sample in &self.data {
            if !sample.is_valid() {
                tracing::debug!(
                    "Discarding malformed sample for channel '{}' (value {})",
                    sample.channel_id,
                    sample.value
                );
                continue;
            }
            if !seen.insert(sample.channel_id.as_str()) {
                tracing::debug!(
                    "Discarding duplicate sample for channel '{}' at {}",
                    sample.channel_id,
                    self.time
                );
                continue;
            }
            entries.push((sample.channel_id.as_str(), sample.value));
        }

        entries
    }
}

/// A continuous producer of sample batches
///
/// Implementations must stop emitting while the `paused` flag is `true` and
/// must stop entirely once `cancel` fires or the receiver is dropped.
pub trait SampleSource: Send + 'static {
    /// Nominal samples per second per channel
    fn sample_rate(&self) -> f64;

    /// Start producing batches
    fn spawn(
        self,
        paused: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<SampleBatch>;
}
