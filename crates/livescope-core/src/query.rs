//! Query facade
//!
//! [`ScopeServer`] is the handle the rendering layer and the ingestion
//! driver share. It wraps the [`SessionStore`] in a read/write lock: the
//! driver takes the write lock for one batch at a time, queries take the
//! read lock only long enough to copy the sessions they need and do the
//! clipping and decimation afterwards.
//!
//! Query windows are resolved against the session list rather than the wall
//! clock, so a window given as a duration skips over paused gaps.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::channel::{ChannelInfo, ChannelRegistry};
use crate::clock::{Clock, Millis, SystemClock};
use crate::config::ScopeConfig;
use crate::error::{ConfigError, InvariantViolation, SourceError};
use crate::events::{EventBus, ScopeEvent};
use crate::session::{clip_sessions, reduce_precision, Session, SessionSpan, SessionStore};
use crate::source::SampleBatch;

/// Time window of a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionWindow {
    /// The whole history
    #[default]
    All,
    /// Between two instants; a missing bound is unbounded
    Range {
        start: Option<Millis>,
        end: Option<Millis>,
    },
    /// `duration` of recorded time starting at `start`
    StartDuration { start: Millis, duration: Millis },
    /// `duration` of recorded time ending at `end`
    EndDuration { end: Millis, duration: Millis },
}

impl SessionWindow {
    /// Window between two instants
    pub fn between(start: Millis, end: Millis) -> Self {
        Self::Range {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Window of recorded time starting at `start`
    pub fn starting_at(start: Millis, duration: Millis) -> Self {
        Self::StartDuration { start, duration }
    }

    /// Window of recorded time ending at `end`
    pub fn ending_at(end: Millis, duration: Millis) -> Self {
        Self::EndDuration { end, duration }
    }
}

/// Options for [`ScopeServer::get_data`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DataOptions {
    /// Time window
    #[serde(default)]
    pub window: SessionWindow,
    /// Approximate number of points per channel over the whole window
    #[serde(default)]
    pub precision: Option<usize>,
}

impl DataOptions {
    /// Options for a window at full precision
    pub fn new(window: SessionWindow) -> Self {
        Self {
            window,
            precision: None,
        }
    }

    /// Limit the number of returned points
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = Some(precision);
        self
    }
}

impl From<SessionWindow> for DataOptions {
    fn from(window: SessionWindow) -> Self {
        Self::new(window)
    }
}

struct Shared {
    store: RwLock<SessionStore>,
    clock: Arc<dyn Clock>,
    paused: watch::Sender<bool>,
    alive_timeout: Millis,
}

/// Thread-safe handle to a session store
#[derive(Clone)]
pub struct ScopeServer {
    inner: Arc<Shared>,
}

impl ScopeServer {
    /// Create a server reading time from the system clock
    pub fn new(config: &ScopeConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a server with an explicit clock
    ///
    /// The configuration is validated first.
    pub fn with_clock(config: &ScopeConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = match config.color_seed {
            Some(seed) => ChannelRegistry::with_seed(config.sample_rate, seed),
            None => ChannelRegistry::new(config.sample_rate),
        };
        let events = EventBus::new(config.event_capacity);
        let store = SessionStore::with_events(registry, events);
        let (paused, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(Shared {
                store: RwLock::new(store),
                clock,
                paused,
                alive_timeout: config.alive_timeout_ms,
            }),
        })
    }

    // A panic while holding the lock cannot leave a half-applied batch
    // behind, so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, SessionStore> {
        self.inner.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionStore> {
        self.inner.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time according to the server's clock
    pub fn now(&self) -> Millis {
        self.inner.clock.now()
    }

    /// All data within a time window, as independent copies
    pub fn get_data(&self, options: &DataOptions) -> Vec<Session> {
        let Some((start, end)) = self.resolve_window(&options.window) else {
            return Vec::new();
        };
        if end <= start {
            return Vec::new();
        }

        let (snapshot, sample_period) = {
            let store = self.read();
            (store.snapshot(start, end), store.sample_period())
        };

        let mut sessions = clip_sessions(snapshot, start, end, sample_period);
        if let Some(precision) = options.precision {
            reduce_precision(&mut sessions, precision);
        }
        sessions
    }

    /// Start and end of every session within a time window
    pub fn get_sessions(&self, window: &SessionWindow) -> Vec<SessionSpan> {
        match self.resolve_window(window) {
            Some((start, end)) => self.read().session_range(start, end),
            None => Vec::new(),
        }
    }

    /// Turn a window into concrete `[start, end)` bounds
    ///
    /// Duration windows walk the sessions away from their anchor and only
    /// count recorded time; they extend into a gap only when the remaining
    /// sessions are too short to cover the duration.
    fn resolve_window(&self, window: &SessionWindow) -> Option<(Millis, Millis)> {
        match *window {
            SessionWindow::All => Some((f64::NEG_INFINITY, f64::INFINITY)),
            SessionWindow::Range { start, end } => Some((
                start.unwrap_or(f64::NEG_INFINITY),
                end.unwrap_or(f64::INFINITY),
            )),
            SessionWindow::StartDuration { start, duration } => {
                if !(duration > 0.0) {
                    return None;
                }
                let spans = self.read().session_range(start, f64::INFINITY);
                let end = forward_end(&spans, duration, self.now())?;
                Some((start, end))
            }
            SessionWindow::EndDuration { end, duration } => {
                if !(duration > 0.0) {
                    return None;
                }
                let spans = self.read().session_range(f64::NEG_INFINITY, end);
                let start = backward_start(&spans, duration, self.now())?;
                Some((start, end))
            }
        }
    }

    /// Stop ingestion and close the open session
    ///
    /// Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        let now = self.now();
        let changed = self.write().pause(now);
        self.inner.paused.send_replace(true);
        changed
    }

    /// Resume ingestion in a fresh session
    ///
    /// Does nothing when no channel has ever been seen. Returns `true` if
    /// ingestion was resumed by this call.
    pub fn play(&self) -> bool {
        let now = self.now();
        let changed = {
            let mut store = self.write();
            if store.registry().is_empty() {
                return false;
            }
            store.resume(now)
        };
        self.inner.paused.send_replace(false);
        changed
    }

    /// Check if ingestion is paused
    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    /// Flag the sample source must honour
    pub fn paused_signal(&self) -> watch::Receiver<bool> {
        self.inner.paused.subscribe()
    }

    /// Match the store's sample rate to the source about to feed it
    ///
    /// Fails once channels have been recorded at a different rate.
    pub fn use_source_rate(&self, sample_rate: f64) -> Result<(), SourceError> {
        self.write().set_sample_rate(sample_rate)
    }

    /// Apply one batch from the sample source
    pub fn ingest(&self, batch: &SampleBatch) -> usize {
        self.write().ingest(batch)
    }

    /// Expire channels that stopped reporting
    pub fn refresh_liveness(&self) -> Vec<String> {
        let now = self.now();
        self.write().refresh_liveness(now, self.inner.alive_timeout)
    }

    /// All channels that were at some point alive
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.read().channels()
    }

    /// All channels that are currently alive
    pub fn alive_channels(&self) -> Vec<ChannelInfo> {
        self.read().alive_channels()
    }

    /// Subscribe to store change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ScopeEvent> {
        self.read().subscribe()
    }

    /// Milliseconds between two samples
    pub fn sample_period(&self) -> Millis {
        self.read().sample_period()
    }

    /// Verify the structural invariants of the session list
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.read().check_invariants()
    }
}

/// End of a window covering `duration` of recorded time from the first span
fn forward_end(spans: &[SessionSpan], duration: Millis, now: Millis) -> Option<Millis> {
    let first = spans.first()?;

    let mut covered = first.duration(now);
    let mut last = 0;
    for (index, span) in spans.iter().enumerate().skip(1) {
        if covered >= duration {
            break;
        }
        last = index;
        covered += span.duration(now);
    }

    Some(spans[last].end_or(now) - (covered - duration))
}

/// Start of a window covering `duration` of recorded time up to the last span
fn backward_start(spans: &[SessionSpan], duration: Millis, now: Millis) -> Option<Millis> {
    let last = spans.last()?;

    let mut covered = last.duration(now);
    let mut first = spans.len() - 1;
    for index in (0..spans.len() - 1).rev() {
        if covered >= duration {
            break;
        }
        first = index;
        covered += spans[index].duration(now);
    }

    Some(spans[first].start_time + (covered - duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: Millis, end: Option<Millis>) -> SessionSpan {
        SessionSpan {
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_forward_end_within_first_span() {
        let spans = [span(0.0, Some(100.0)), span(200.0, Some(300.0))];
        assert_eq!(forward_end(&spans, 40.0, 0.0), Some(40.0));
    }

    #[test]
    fn test_forward_end_skips_gap() {
        let spans = [span(0.0, Some(100.0)), span(200.0, Some(300.0))];
        // 100ms from the first span, 50ms from the second
        assert_eq!(forward_end(&spans, 150.0, 0.0), Some(250.0));
    }

    #[test]
    fn test_forward_end_spills_past_last_span() {
        let spans = [span(0.0, Some(100.0)), span(200.0, Some(300.0))];
        assert_eq!(forward_end(&spans, 250.0, 0.0), Some(350.0));
    }

    #[test]
    fn test_forward_end_open_span_uses_now() {
        let spans = [span(0.0, None)];
        assert_eq!(forward_end(&spans, 100.0, 500.0), Some(100.0));
    }

    #[test]
    fn test_backward_start_skips_gap() {
        let spans = [span(0.0, Some(100.0)), span(200.0, Some(300.0))];
        assert_eq!(backward_start(&spans, 50.0, 0.0), Some(250.0));
        assert_eq!(backward_start(&spans, 150.0, 0.0), Some(50.0));
        assert_eq!(backward_start(&spans, 250.0, 0.0), Some(-50.0));
    }

    #[test]
    fn test_empty_spans_resolve_to_nothing() {
        assert_eq!(forward_end(&[], 10.0, 0.0), None);
        assert_eq!(backward_start(&[], 10.0, 0.0), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ScopeConfig {
            sample_rate: 0.0,
            ..ScopeConfig::default()
        };
        let result = ScopeServer::new(&config);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "sample_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_window_json() {
        let window: SessionWindow =
            serde_json::from_str(r#"{"kind": "end_duration", "end": 5000, "duration": 1000}"#)
                .unwrap();
        assert_eq!(window, SessionWindow::ending_at(5000.0, 1000.0));

        let options: DataOptions = serde_json::from_str(r#"{"precision": 200}"#).unwrap();
        assert_eq!(options.window, SessionWindow::All);
        assert_eq!(options.precision, Some(200));
    }
}
