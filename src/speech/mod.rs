//! Spoken narration
//!
//! Every producer speaks through a [`SpeechHandle`]. The handle feeds the
//! single [`SpeechArbiter`] task, which owns the one [`SpeechEngine`] and
//! decides whether a request starts, preempts the current utterance, or is
//! dropped.

mod arbiter;
mod engine;
mod playback;
mod tts;

pub use arbiter::{ArbiterState, SpeechArbiter, SpeechDecision, SpeechEvent, spawn_arbiter};
pub use engine::{
    CompletionNotifier, ConsoleSpeechEngine, SpeechEngine, SynthesizedSpeechEngine, Utterance,
};
pub use playback::AudioPlayback;
pub use tts::TextToSpeech;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Which subsystem produced a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechSource {
    /// Obstacle descriptions and capture acknowledgements
    Vision,
    /// Turn instructions and route status
    Navigation,
    /// Spoken current-location label
    Readback,
    /// Permission, sensor and input prompts
    System,
}

impl std::fmt::Display for SpeechSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vision => "vision",
            Self::Navigation => "navigation",
            Self::Readback => "readback",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

/// One thing to say
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechRequest {
    pub text: String,
    pub source: SpeechSource,
    /// Preempt whatever is currently audible instead of being dropped
    pub interrupt: bool,
}

impl SpeechRequest {
    /// Request that cuts off the current utterance
    #[must_use]
    pub fn interrupting(source: SpeechSource, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source,
            interrupt: true,
        }
    }

    /// Request that is dropped if something is already being spoken
    #[must_use]
    pub fn polite(source: SpeechSource, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source,
            interrupt: false,
        }
    }
}

/// Cloneable sender into the arbiter
///
/// `speak` never blocks and never fails loudly: once the arbiter is gone the
/// request is discarded with a log line.
#[derive(Debug, Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechRequest>,
}

impl SpeechHandle {
    /// Create a handle and the receiver the arbiter consumes
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SpeechRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submit a request to the arbiter
    pub fn speak(&self, request: SpeechRequest) {
        if let Err(e) = self.tx.send(request) {
            tracing::warn!(text = %e.0.text, "speech arbiter stopped, request discarded");
        }
    }
}
