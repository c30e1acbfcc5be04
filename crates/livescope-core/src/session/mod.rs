//! Session Store
//!
//! Ingests timestamped multi-channel samples, groups them into recording
//! sessions and answers windowed range queries.
//!
//! A session is a maximal interval during which ingestion was active and the
//! channel set did not change. Within a session every channel holds the same
//! number of values and sample `i` is implicitly timestamped
//! `start_time + i * sample_period`.

mod precision;
mod range;
mod store;

pub use precision::reduce_precision;
pub use range::{clip_sessions, select_sessions, span_range};
pub use store::{IngestState, SessionStore};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Millis;

/// Values recorded for one channel during one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    /// Channel id
    pub channel: String,
    /// Samples in time order; `NaN` marks a tick the channel missed
    #[serde(with = "gaps_as_null")]
    pub values: Vec<f64>,
}

impl ChannelData {
    /// Empty value list for a channel
    pub fn empty(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            values: Vec::new(),
        }
    }
}

/// `NaN` gap markers travel as JSON `null`
mod gaps_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(values.iter().map(|v| (!v.is_nan()).then_some(*v)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// A recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id
    pub id: Uuid,
    /// When the session started
    pub start_time: Millis,
    /// When the session ended; `None` while it is still receiving data
    pub end_time: Option<Millis>,
    /// Data retrieved during the session, one entry per channel
    pub data: Vec<ChannelData>,
}

impl Session {
    /// Open a new session with an empty value list for every channel
    pub fn open<'a, I>(start_time: Millis, channels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: None,
            data: channels.into_iter().map(ChannelData::empty).collect(),
        }
    }

    /// Check if the session is still receiving data
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Number of samples per channel
    pub fn sample_count(&self) -> usize {
        self.data.first().map(|d| d.values.len()).unwrap_or(0)
    }

    /// Values of one channel
    pub fn channel(&self, id: &str) -> Option<&ChannelData> {
        self.data.iter().find(|d| d.channel == id)
    }

    /// Implicit timestamp of sample `index`
    pub fn timestamp(&self, index: usize, sample_period: Millis) -> Millis {
        self.start_time + index as f64 * sample_period
    }

    /// Time of the first instant not covered by the recorded samples
    pub fn data_end(&self, sample_period: Millis) -> Millis {
        self.timestamp(self.sample_count(), sample_period)
    }

    /// Start/end metadata
    pub fn span(&self) -> SessionSpan {
        SessionSpan {
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Start and end of a session without its data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSpan {
    /// When the session started
    pub start_time: Millis,
    /// When the session ended; `None` while open
    pub end_time: Option<Millis>,
}

impl SessionSpan {
    /// End time, treating an open session as ending at `now`
    pub fn end_or(&self, now: Millis) -> Millis {
        self.end_time.unwrap_or_else(|| now.max(self.start_time))
    }

    /// Covered duration, treating an open session as ending at `now`
    pub fn duration(&self, now: Millis) -> Millis {
        self.end_or(now) - self.start_time
    }
}
