//! In-process event bus
//!
//! Subsystems publish state changes here; the HTTP API streams them out.
//! Publishing is best-effort: with no subscriber the event is discarded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::navigation::NavigationEvent;
use crate::speech::SpeechEvent;

/// Default number of events buffered per subscriber
const DEFAULT_CAPACITY: usize = 256;

/// Every event a subsystem can publish
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum Event {
    Navigation(NavigationEvent),
    Speech(SpeechEvent),
}

impl From<NavigationEvent> for Event {
    fn from(event: NavigationEvent) -> Self {
        Self::Navigation(event)
    }
}

impl From<SpeechEvent> for Event {
    fn from(event: SpeechEvent) -> Self {
        Self::Speech(event)
    }
}

/// Event with the wall-clock time it was delivered, as sent to clients
#[derive(Debug, Serialize)]
pub struct StampedEvent<'a> {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: &'a Event,
}

impl<'a> StampedEvent<'a> {
    /// Stamp `event` with the current time
    #[must_use]
    pub fn now(event: &'a Event) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Cloneable publisher shared by all subsystems
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: impl Into<Event>) {
        // Err only means nobody is listening
        let _ = self.tx.send(event.into());
    }

    /// Subscribe to events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
