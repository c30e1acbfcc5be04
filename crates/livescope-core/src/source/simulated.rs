//! Simulated source - sine wave generator for testing
//!
//! Produces one batch per sample period for a fixed set of channels without
//! any device attached. Each channel is a sine wave with its own offset,
//! frequency and amplification plus a little seeded noise.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{ChannelSample, SampleBatch, SampleSource};
use crate::clock::{Clock, Millis};

/// Radians per millisecond for a 1 Hz wave
const RADIANS_PER_MS: f64 = 2.0 * std::f64::consts::PI / 1000.0;

/// Default capacity of the batch queue between source and driver
pub const DEFAULT_SOURCE_BUFFER: usize = 1024;

/// Shape of one simulated channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedChannel {
    /// Channel id
    pub id: String,
    /// Constant added to the wave
    pub offset: f64,
    /// Wave frequency in Hz
    pub frequency: f64,
    /// Multiplier applied to the phase
    pub amplification: f64,
}

impl SimulatedChannel {
    /// Value of the wave at `time`, without noise
    pub fn value_at(&self, time: Millis) -> f64 {
        self.offset + (RADIANS_PER_MS * self.frequency * time * self.amplification).sin()
    }

    /// The two channels used when nothing else is configured
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                id: "111".to_string(),
                offset: 3.0,
                frequency: 3.0,
                amplification: 1.0,
            },
            Self {
                id: "222".to_string(),
                offset: 7.0,
                frequency: 5.0,
                amplification: 2.0,
            },
        ]
    }
}

/// Sine wave source driven by a tokio interval
pub struct SimulatedSource {
    /// Channels to generate
    channels: Vec<SimulatedChannel>,
    /// Samples per second
    sample_rate: f64,
    /// Peak amplitude of the uniform noise added to every value
    noise: f64,
    /// Capacity of the outgoing queue
    buffer: usize,
    /// Time source for sample timestamps
    clock: Arc<dyn Clock>,
    /// Random number generator for noise
    rng: StdRng,
}

impl SimulatedSource {
    /// Create a source for `channels` sampled at `sample_rate` Hz
    pub fn new(sample_rate: f64, channels: Vec<SimulatedChannel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            channels,
            sample_rate,
            noise: 0.0,
            buffer: DEFAULT_SOURCE_BUFFER,
            clock,
            rng: StdRng::from_entropy(),
        }
    }

    /// Add uniform noise in `[-noise, noise]` to every value
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Use a deterministic noise sequence
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Set the capacity of the outgoing queue
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Milliseconds between two batches
    pub fn sample_period(&self) -> Millis {
        1000.0 / self.sample_rate
    }

    /// Generate the batch for `time`
    pub fn sample(&mut self, time: Millis) -> SampleBatch {
        let noise = self.noise;
        let data = self
            .channels
            .iter()
            .map(|channel| {
                let jitter = if noise > 0.0 {
                    self.rng.gen_range(-noise..=noise)
                } else {
                    0.0
                };
                ChannelSample::new(channel.id.clone(), channel.value_at(time) + jitter)
            })
            .collect();
        SampleBatch::new(time, data)
    }

    /// Latest sample instant at or before `now`
    fn align(&self, now: Millis) -> Millis {
        let period = self.sample_period();
        now - now.rem_euclid(period)
    }

    async fn run(
        mut self,
        tx: mpsc::Sender<SampleBatch>,
        paused: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) {
        let period = self.sample_period();
        if !(period.is_finite() && period > 0.0) {
            tracing::warn!("Simulated source has no usable sample rate ({} Hz)", self.sample_rate);
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(period / 1000.0));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Last instant a batch was produced for; `None` while paused
        let mut last_push: Option<Millis> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if *paused.borrow() {
                last_push = None;
                continue;
            }

            let current = self.align(self.clock.now());
            let Some(last) = last_push else {
                last_push = Some(current);
                continue;
            };

            // Catch up on every sample period elapsed since the last tick
            let pending = ((current - last) / period).round() as u64;
            for k in 1..=pending {
                let batch = self.sample(last + k as f64 * period);
                if tx.send(batch).await.is_err() {
                    tracing::debug!("Simulated source receiver dropped");
                    return;
                }
            }
            last_push = Some(current);
        }

        tracing::debug!("Simulated source cancelled");
    }
}

impl SampleSource for SimulatedSource {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn spawn(
        self,
        paused: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<SampleBatch> {
        let (tx, rx) = mpsc::channel(self.buffer);
        tokio::spawn(self.run(tx, paused, cancel));
        rx
    }
}
