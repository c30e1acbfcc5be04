//! Change notifications
//!
//! The store has no reactivity of its own. Every state change it makes is
//! published as a [`ScopeEvent`] on a broadcast channel; the rendering layer
//! subscribes and re-queries as it sees fit.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::channel::Hsl;
use crate::clock::Millis;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A state change in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScopeEvent {
    /// A channel was seen for the first time
    ChannelAdded { id: String, color: Hsl },
    /// A channel became alive or stopped being alive
    ChannelLiveness { id: String, alive: bool },
    /// A new session started receiving data
    SessionOpened { id: Uuid, start_time: Millis },
    /// A session stopped receiving data
    SessionClosed {
        id: Uuid,
        start_time: Millis,
        end_time: Millis,
    },
    /// Ingestion was paused
    Paused { at: Millis },
    /// Ingestion was resumed
    Resumed { at: Millis },
}

/// Sending half shared by the store and the facade
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ScopeEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: ScopeEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScopeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
