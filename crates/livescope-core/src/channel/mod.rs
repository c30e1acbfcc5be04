//! Channel Registry
//!
//! Tracks every measurement channel that has ever produced a sample: its
//! identity, display colour, liveness and nominal sample rate.

mod color;
mod registry;

pub use color::{pick_hue, Hsl};
pub use registry::ChannelRegistry;

use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// Snapshot of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Stable, unique identifier reported by the source
    pub id: String,
    /// Display colour
    pub color: Hsl,
    /// Whether the channel has produced data recently
    pub alive: bool,
    /// Nominal samples per second
    pub sample_rate: f64,
    /// Time of the most recent sample, if any
    pub last_seen: Option<Millis>,
}

impl ChannelInfo {
    /// Create a live channel with the given colour
    pub fn new(id: impl Into<String>, color: Hsl, sample_rate: f64) -> Self {
        Self {
            id: id.into(),
            color,
            alive: true,
            sample_rate,
            last_seen: None,
        }
    }
}
