//! Spoken destination entry
//!
//! The recognizer pushes partial transcripts. After a stretch of silence (or
//! an explicit stop) the transcript becomes a route request.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::features::{Feature, FeatureGate};
use crate::navigation::NavigationHandle;
use crate::timer::CancellableTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictationSettings {
    /// Quiet period after the last transcript update that ends dictation
    #[serde(with = "crate::timer::secs_f64")]
    pub silence_timeout: Duration,
}

impl Default for DictationSettings {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a dictation input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationStep {
    /// Listening; nothing to submit yet
    Listening,
    /// Dictation ended with this transcript
    Submit(String),
    /// Input arrived while not listening
    Ignored,
}

/// One listen-and-submit cycle
#[derive(Debug)]
pub struct DictationSession {
    settings: DictationSettings,
    listening: bool,
    transcript: String,
    silence: CancellableTimer,
}

impl DictationSession {
    #[must_use]
    pub const fn new(settings: DictationSettings) -> Self {
        Self {
            settings,
            listening: false,
            transcript: String::new(),
            silence: CancellableTimer::new("dictation-silence"),
        }
    }

    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Begin listening; while already listening this ends the session
    pub fn start(&mut self) -> DictationStep {
        if self.listening {
            return self.stop();
        }

        self.listening = true;
        self.transcript.clear();
        self.silence.start_once(self.settings.silence_timeout);
        tracing::debug!("dictation started");
        DictationStep::Listening
    }

    /// Replace the transcript and postpone the silence timeout
    pub fn on_transcript(&mut self, text: &str) -> DictationStep {
        if !self.listening {
            return DictationStep::Ignored;
        }

        text.clone_into(&mut self.transcript);
        self.silence.start_once(self.settings.silence_timeout);
        DictationStep::Listening
    }

    /// End the session and hand over the transcript
    pub fn stop(&mut self) -> DictationStep {
        if !self.listening {
            return DictationStep::Ignored;
        }

        self.listening = false;
        self.silence.cancel();
        let transcript = std::mem::take(&mut self.transcript);
        tracing::debug!(transcript = %transcript, "dictation finished");
        DictationStep::Submit(transcript)
    }

    /// Wait for the silence timeout; pending while not listening
    pub async fn silence_elapsed(&mut self) {
        self.silence.fired().await;
    }

    /// Whether the silence timer is armed
    #[must_use]
    pub const fn timer_armed(&self) -> bool {
        self.silence.is_armed()
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Transcript(String),
    Stop,
}

/// Cloneable front door to the dictation task
#[derive(Debug, Clone)]
pub struct DictationHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DictationHandle {
    /// Start listening (or stop, if already listening)
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Push the recognizer's latest transcript
    pub fn transcript(&self, text: impl Into<String>) {
        self.send(Command::Transcript(text.into()));
    }

    /// Stop listening and submit
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::warn!("dictation task stopped, input discarded");
        }
    }
}

/// Run dictation as a task that submits transcripts as route requests
pub fn spawn_dictation(
    settings: DictationSettings,
    gate: Arc<FeatureGate>,
    navigation: NavigationHandle,
) -> (DictationHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let mut session = DictationSession::new(settings);

        loop {
            let step = tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Start) => {
                        if !session.is_listening() && !gate.is_enabled(Feature::Microphone) {
                            // Already reported when the permission was denied
                            tracing::debug!("dictation refused without microphone");
                            continue;
                        }
                        session.start()
                    }
                    Some(Command::Transcript(text)) => session.on_transcript(&text),
                    Some(Command::Stop) => session.stop(),
                    None => break,
                },
                () = session.silence_elapsed() => {
                    tracing::debug!("dictation silence timeout");
                    session.stop()
                }
            };

            if let DictationStep::Submit(transcript) = step {
                let navigation = navigation.clone();
                tokio::spawn(async move {
                    // The tracker announces every outcome itself
                    if let Err(e) = navigation.request_route(transcript).await {
                        tracing::debug!(error = %e, "dictated route request failed");
                    }
                });
            }
        }
    });

    (DictationHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_toggles() {
        let mut session = DictationSession::new(DictationSettings::default());
        assert_eq!(session.start(), DictationStep::Listening);
        assert!(session.timer_armed());

        session.on_transcript("Central Library");
        assert_eq!(
            session.start(),
            DictationStep::Submit("Central Library".to_string())
        );
        assert!(!session.is_listening());
        assert!(!session.timer_armed());
    }

    #[test]
    fn test_transcript_ignored_when_not_listening() {
        let mut session = DictationSession::new(DictationSettings::default());
        assert_eq!(session.on_transcript("hello"), DictationStep::Ignored);
        assert_eq!(session.stop(), DictationStep::Ignored);
    }

    #[test]
    fn test_transcript_replaced_not_appended() {
        let mut session = DictationSession::new(DictationSettings::default());
        session.start();
        session.on_transcript("Central");
        session.on_transcript("Central Library");
        assert_eq!(session.transcript(), "Central Library");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_timeout_postponed_by_updates() {
        let mut session = DictationSession::new(DictationSettings::default());
        let start = tokio::time::Instant::now();
        session.start();

        tokio::time::advance(Duration::from_millis(1500)).await;
        session.on_transcript("Central Library");

        session.silence_elapsed().await;
        assert!(start.elapsed() >= Duration::from_millis(3500));
        assert_eq!(
            session.stop(),
            DictationStep::Submit("Central Library".to_string())
        );
    }
}
