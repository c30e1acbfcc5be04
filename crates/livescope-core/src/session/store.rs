//! Session store
//!
//! Owns the channel registry and the session list. All mutation goes through
//! [`SessionStore::ingest`], [`SessionStore::pause`] and
//! [`SessionStore::resume`]; each call leaves the list consistent, so a
//! reader holding the store's lock never sees a half-applied batch.

use std::collections::HashMap;

use super::range::{clip_sessions, select_sessions, span_range};
use super::{Session, SessionSpan};
use crate::channel::{ChannelInfo, ChannelRegistry};
use crate::clock::Millis;
use crate::error::{InvariantViolation, SourceError};
use crate::events::{EventBus, ScopeEvent};
use crate::source::SampleBatch;

/// Ingestion state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Nothing has been ingested yet, or play was requested with no channels
    Idle,
    /// The last session is open and receiving data
    Open,
    /// Ingestion is paused; every session is closed
    Paused,
}

/// Session-buffered time-series store
pub struct SessionStore {
    /// Every channel ever observed
    registry: ChannelRegistry,
    /// Sessions ordered by start time; only the last may be open
    sessions: Vec<Session>,
    /// Current ingestion state
    state: IngestState,
    /// Milliseconds between two samples of a channel
    sample_period: Millis,
    /// Change notifications
    events: EventBus,
}

impl SessionStore {
    /// Create an empty store using the registry's sample rate
    pub fn new(registry: ChannelRegistry) -> Self {
        Self::with_events(registry, EventBus::default())
    }

    /// Create an empty store publishing to an existing event bus
    pub fn with_events(registry: ChannelRegistry, events: EventBus) -> Self {
        let sample_period = 1000.0 / registry.sample_rate();
        Self {
            registry,
            sessions: Vec::new(),
            state: IngestState::Idle,
            sample_period,
            events,
        }
    }

    /// Record at the sample rate of the attached source
    ///
    /// Implicit timestamps depend on the rate, so it can only change before
    /// the first channel is registered.
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<(), SourceError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SourceError::InvalidRate(sample_rate));
        }

        let current = self.registry.sample_rate();
        if sample_rate == current {
            return Ok(());
        }
        if !self.registry.is_empty() {
            return Err(SourceError::RateMismatch {
                store_rate: current,
                source_rate: sample_rate,
            });
        }

        tracing::info!("Sample rate changed from {} Hz to {} Hz", current, sample_rate);
        self.registry.set_sample_rate(sample_rate);
        self.sample_period = 1000.0 / sample_rate;
        Ok(())
    }

    /// Ingest one batch of samples taken at `batch.time`
    ///
    /// Returns the number of accepted samples. Malformed entries are skipped,
    /// the rest of the batch is still applied. Nothing happens while paused.
    pub fn ingest(&mut self, batch: &SampleBatch) -> usize {
        if self.state == IngestState::Paused {
            return 0;
        }
        if !batch.time.is_finite() {
            tracing::debug!("Discarding batch with non-finite time {}", batch.time);
            return 0;
        }

        let entries = batch.valid_entries();
        if entries.is_empty() {
            return 0;
        }
        let time = batch.time;

        // Ingestion becoming active opens a session with the channels known
        // so far, which is empty on the very first batch
        if self.state != IngestState::Open {
            self.start_session(time);
        }

        let mut channel_created = false;
        for (id, _) in &entries {
            let (channel, created) = self.registry.ensure_channel(id, time);
            if created {
                channel_created = true;
                let event = ScopeEvent::ChannelAdded {
                    id: channel.id.clone(),
                    color: channel.color,
                };
                self.events.emit(event);
            }
        }

        // New channels cut a session boundary so every session stays rectangular
        if channel_created {
            self.start_session(time);
        }

        let by_channel: HashMap<&str, f64> = entries.iter().copied().collect();
        if let Some(session) = self.sessions.last_mut() {
            for channel in &mut session.data {
                let value = by_channel
                    .get(channel.channel.as_str())
                    .copied()
                    .unwrap_or(f64::NAN);
                channel.values.push(value);
            }
        }

        for (id, _) in &entries {
            if self.registry.mark_alive(id, time) {
                self.events.emit(ScopeEvent::ChannelLiveness {
                    id: id.to_string(),
                    alive: true,
                });
            }
        }

        entries.len()
    }

    /// Close the open session at `now` and stop accepting samples
    ///
    /// Returns `false` if the store was already paused.
    pub fn pause(&mut self, now: Millis) -> bool {
        if self.state == IngestState::Paused {
            return false;
        }

        self.close_open_session(now);
        self.state = IngestState::Paused;
        tracing::info!("Ingestion paused at {:.3}", now);
        self.events.emit(ScopeEvent::Paused { at: now });
        true
    }

    /// Resume ingestion, opening a fresh session at `now`
    ///
    /// Returns `false` if the store was not paused. With no known channels
    /// the store goes back to idle and the next sample opens the session.
    pub fn resume(&mut self, now: Millis) -> bool {
        if self.state != IngestState::Paused {
            return false;
        }

        if self.registry.is_empty() {
            self.state = IngestState::Idle;
        } else {
            self.start_session(now);
        }
        tracing::info!("Ingestion resumed at {:.3}", now);
        self.events.emit(ScopeEvent::Resumed { at: now });
        true
    }

    /// Close the open session (if any) and open a new one for all channels
    fn start_session(&mut self, at: Millis) {
        self.close_open_session(at);

        // Never start before the previous session ended
        let start = self
            .sessions
            .last()
            .and_then(|s| s.end_time)
            .map_or(at, |end| at.max(end));

        let session = Session::open(start, self.registry.ids());
        tracing::info!(
            "Opened session {} at {:.3} with {} channel(s)",
            session.id,
            start,
            session.data.len()
        );
        self.events.emit(ScopeEvent::SessionOpened {
            id: session.id,
            start_time: start,
        });

        self.sessions.push(session);
        self.state = IngestState::Open;
    }

    fn close_open_session(&mut self, at: Millis) {
        let Some(session) = self.sessions.last_mut().filter(|s| s.is_open()) else {
            return;
        };

        // Never end before the last recorded sample period
        let end = at.max(session.data_end(self.sample_period));
        session.end_time = Some(end);
        tracing::info!(
            "Closed session {} after {} sample(s)",
            session.id,
            session.sample_count()
        );
        self.events.emit(ScopeEvent::SessionClosed {
            id: session.id,
            start_time: session.start_time,
            end_time: end,
        });
    }

    /// Copy the sessions overlapping `[start, end)` without clipping them
    ///
    /// This is the part of a range query that needs the store; callers
    /// sharing the store behind a lock should release it before clipping.
    pub fn snapshot(&self, start: Millis, end: Millis) -> Vec<Session> {
        match select_sessions(&self.sessions, start, end, |s| s.start_time, |s| s.end_time) {
            Some(range) => self.sessions[range].to_vec(),
            None => Vec::new(),
        }
    }

    /// Copied sessions clipped to `[start, end)`
    pub fn query_range(&self, start: Millis, end: Millis) -> Vec<Session> {
        clip_sessions(self.snapshot(start, end), start, end, self.sample_period)
    }

    /// Session metadata overlapping `[start, end)`
    pub fn session_range(&self, start: Millis, end: Millis) -> Vec<SessionSpan> {
        span_range(&self.spans(), start, end)
    }

    /// Metadata of every session
    pub fn spans(&self) -> Vec<SessionSpan> {
        self.sessions.iter().map(Session::span).collect()
    }

    /// Mark channels without recent data as not alive
    pub fn refresh_liveness(&mut self, now: Millis, timeout: Millis) -> Vec<String> {
        let changed = self.registry.refresh_liveness(now, timeout);
        for id in &changed {
            tracing::debug!("Channel '{}' is no longer alive", id);
            self.events.emit(ScopeEvent::ChannelLiveness {
                id: id.clone(),
                alive: false,
            });
        }
        changed
    }

    /// Verify ordering, openness and rectangularity of the session list
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let last = self.sessions.len().saturating_sub(1);

        for (index, session) in self.sessions.iter().enumerate() {
            match session.end_time {
                None if index != last => {
                    return Err(InvariantViolation::OpenBeforeLast { index });
                }
                Some(end) if end < session.start_time => {
                    return Err(InvariantViolation::NegativeDuration {
                        index,
                        start: session.start_time,
                        end,
                    });
                }
                _ => {}
            }

            let expected = session.sample_count();
            if let Some(bad) = session.data.iter().find(|d| d.values.len() != expected) {
                return Err(InvariantViolation::NotRectangular {
                    index,
                    channel: bad.channel.clone(),
                    expected,
                    actual: bad.values.len(),
                });
            }
        }

        for (index, pair) in self.sessions.windows(2).enumerate() {
            let end = pair[0].end_time.unwrap_or(f64::INFINITY);
            if end > pair[1].start_time {
                return Err(InvariantViolation::Overlap {
                    index,
                    next: index + 1,
                    end,
                    start: pair[1].start_time,
                });
            }
        }

        Ok(())
    }

    /// All sessions, oldest first
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Number of sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Current ingestion state
    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Check if ingestion is paused
    pub fn is_paused(&self) -> bool {
        self.state == IngestState::Paused
    }

    /// Milliseconds between two samples
    pub fn sample_period(&self) -> Millis {
        self.sample_period
    }

    /// The channel registry
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Snapshot of every channel
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.registry.channels().to_vec()
    }

    /// Snapshot of the channels that are currently alive
    pub fn alive_channels(&self) -> Vec<ChannelInfo> {
        self.registry.alive_channels().cloned().collect()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ScopeEvent> {
        self.events.subscribe()
    }
}
