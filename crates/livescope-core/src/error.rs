//! Error types
//!
//! Ingestion and range queries are total and never fail. Errors only come
//! from configuration, from attaching a sample source, and from the
//! invariant checker used by tests.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a [`ScopeConfig`](crate::config::ScopeConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised while attaching a sample source to a store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Invalid sample rate: {0}")]
    InvalidRate(f64),

    #[error("Source samples at {source_rate} Hz but the store already records at {store_rate} Hz")]
    RateMismatch { store_rate: f64, source_rate: f64 },
}

/// A broken structural invariant of the session list
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("Session {index} ends at {end} after session {next} starts at {start}")]
    Overlap {
        index: usize,
        next: usize,
        end: f64,
        start: f64,
    },

    #[error("Session {index} is open but is not the last session")]
    OpenBeforeLast { index: usize },

    #[error("Session {index} ends at {end} before it starts at {start}")]
    NegativeDuration { index: usize, start: f64, end: f64 },

    #[error("Session {index} is not rectangular: channel '{channel}' has {actual} values, expected {expected}")]
    NotRectangular {
        index: usize,
        channel: String,
        expected: usize,
        actual: usize,
    },
}
