//! # LiveScope Core Library
//!
//! Core functionality for the LiveScope live measurement viewer.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A channel registry with automatic colour assignment and liveness
//! - A session-buffered time-series store fed by a single ingestion task
//! - Windowed range queries with clipping and nearest-sample decimation
//! - A simulated sine-wave sample source
//!
//! ## Example
//!
//! ```rust,ignore
//! use livescope_core::prelude::*;
//!
//! let config = ScopeConfig::default();
//! let server = ScopeServer::new(&config)?;
//!
//! // Feed the store from a simulated source
//! let source = SimulatedSource::new(config.sample_rate, SimulatedChannel::defaults(), clock);
//! let driver = IngestDriver::spawn(server.clone(), source)?;
//!
//! // The last second of recorded data, at most 500 points per channel
//! let options = DataOptions::new(SessionWindow::ending_at(server.now(), 1000.0))
//!     .with_precision(500);
//! for session in server.get_data(&options) {
//!     println!("{} .. {:?}", session.start_time, session.end_time);
//! }
//! ```

pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod query;
pub mod session;
pub mod source;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::channel::{ChannelInfo, ChannelRegistry, Hsl};
    pub use crate::clock::{Clock, ManualClock, Millis, SystemClock};
    pub use crate::config::{ScopeConfig, SimulatorConfig};
    pub use crate::error::{ConfigError, InvariantViolation, SourceError};
    pub use crate::events::ScopeEvent;
    pub use crate::query::{DataOptions, ScopeServer, SessionWindow};
    pub use crate::session::{ChannelData, IngestState, Session, SessionSpan, SessionStore};
    pub use crate::source::{
        ChannelSample, IngestDriver, IngestStats, SampleBatch, SampleSource, SimulatedChannel,
        SimulatedSource,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
