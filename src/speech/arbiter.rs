//! Single-voice speech arbitration
//!
//! At most one utterance is audible. A new request either starts immediately
//! (idle), cancels the current utterance and starts (interrupting), or is
//! dropped (non-interrupting while speaking). Nothing is ever queued.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CompletionNotifier, SpeechEngine, SpeechHandle, SpeechRequest, SpeechSource, Utterance};
use crate::events::EventBus;

/// What is audible right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterState {
    Idle,
    Speaking(Utterance),
}

/// Outcome of submitting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechDecision {
    /// Arbiter was idle; the utterance started
    Started { id: u64 },
    /// The current utterance was cancelled for this one
    Interrupted { cancelled: u64, id: u64 },
    /// Something was already audible; the request was discarded
    Dropped,
}

/// Arbitration decisions, published for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechEvent {
    Started {
        id: u64,
        source: SpeechSource,
        text: String,
    },
    Finished {
        id: u64,
    },
    Interrupted {
        id: u64,
    },
    Dropped {
        source: SpeechSource,
        text: String,
    },
}

/// Owner of the speech engine and the speaking state
pub struct SpeechArbiter {
    engine: Box<dyn SpeechEngine>,
    state: ArbiterState,
    next_id: u64,
    completions_tx: mpsc::UnboundedSender<u64>,
    completions_rx: Option<mpsc::UnboundedReceiver<u64>>,
    events: EventBus,
}

impl SpeechArbiter {
    /// Create an idle arbiter over `engine`
    #[must_use]
    pub fn new(engine: Box<dyn SpeechEngine>, events: EventBus) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            state: ArbiterState::Idle,
            next_id: 1,
            completions_tx,
            completions_rx: Some(completions_rx),
            events,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> &ArbiterState {
        &self.state
    }

    /// Apply the interrupt/drop policy to one request
    pub fn submit(&mut self, request: SpeechRequest) -> SpeechDecision {
        let cancelled = match &self.state {
            ArbiterState::Idle => None,
            ArbiterState::Speaking(current) if request.interrupt => Some(current.id),
            ArbiterState::Speaking(current) => {
                tracing::debug!(
                    source = %request.source,
                    speaking = current.id,
                    text = %request.text,
                    "speech dropped"
                );
                self.events.publish(SpeechEvent::Dropped {
                    source: request.source,
                    text: request.text,
                });
                return SpeechDecision::Dropped;
            }
        };

        if let Some(cancelled) = cancelled {
            self.engine.cancel();
            tracing::debug!(id = cancelled, source = %request.source, "speech interrupted");
            self.events.publish(SpeechEvent::Interrupted { id: cancelled });
        }

        let id = self.next_id;
        self.next_id += 1;

        let utterance = Utterance {
            id,
            text: request.text,
            source: request.source,
        };

        tracing::info!(id, source = %utterance.source, text = %utterance.text, "speaking");
        self.events.publish(SpeechEvent::Started {
            id,
            source: utterance.source,
            text: utterance.text.clone(),
        });

        let notifier = CompletionNotifier::new(id, self.completions_tx.clone());
        self.engine.speak(&utterance, notifier);
        self.state = ArbiterState::Speaking(utterance);

        match cancelled {
            Some(cancelled) => SpeechDecision::Interrupted { cancelled, id },
            None => SpeechDecision::Started { id },
        }
    }

    /// Handle the engine's completion for utterance `id`
    ///
    /// Returns false for completions of anything but the current utterance.
    pub fn complete(&mut self, id: u64) -> bool {
        match &self.state {
            ArbiterState::Speaking(current) if current.id == id => {
                tracing::debug!(id, "speech finished");
                self.state = ArbiterState::Idle;
                self.events.publish(SpeechEvent::Finished { id });
                true
            }
            _ => {
                tracing::trace!(id, "stale completion ignored");
                false
            }
        }
    }

    /// Serve requests until every [`SpeechHandle`] is dropped
    pub async fn run(mut self, mut requests: mpsc::UnboundedReceiver<SpeechRequest>) {
        let Some(mut completions) = self.completions_rx.take() else {
            tracing::error!("speech arbiter already running");
            return;
        };

        tracing::debug!(engine = self.engine.name(), "speech arbiter started");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => {
                        self.submit(request);
                    }
                    None => break,
                },
                Some(id) = completions.recv() => {
                    self.complete(id);
                }
            }
        }

        self.engine.cancel();
        tracing::debug!("speech arbiter stopped");
    }
}

/// Start the arbiter task over `engine`
pub fn spawn_arbiter(
    engine: Box<dyn SpeechEngine>,
    events: EventBus,
) -> (SpeechHandle, JoinHandle<()>) {
    let (handle, requests) = SpeechHandle::channel();
    let arbiter = SpeechArbiter::new(engine, events);
    let task = tokio::spawn(arbiter.run(requests));
    (handle, task)
}
