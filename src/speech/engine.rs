//! Speech output engines

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AudioPlayback, SpeechSource, TextToSpeech};

/// An utterance handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub source: SpeechSource,
}

/// Reports that an utterance finished playing
///
/// Consumed on use, so each utterance completes at most once. Dropping it
/// without calling [`finished`](Self::finished) means the utterance was cut off.
#[derive(Debug)]
pub struct CompletionNotifier {
    id: u64,
    tx: mpsc::UnboundedSender<u64>,
}

impl CompletionNotifier {
    pub(crate) const fn new(id: u64, tx: mpsc::UnboundedSender<u64>) -> Self {
        Self { id, tx }
    }

    /// Id of the utterance this notifier belongs to
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Signal natural completion
    pub fn finished(self) {
        // Arbiter gone means nobody cares any more
        let _ = self.tx.send(self.id);
    }
}

/// The single audio output device
///
/// Only the arbiter calls into an engine. `speak` must return promptly and do
/// the actual work elsewhere.
pub trait SpeechEngine: Send + 'static {
    /// Begin speaking; call `done.finished()` when playback ends
    fn speak(&mut self, utterance: &Utterance, done: CompletionNotifier);

    /// Stop the current utterance immediately
    fn cancel(&mut self);

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Prints utterances and completes after an estimated speaking time
pub struct ConsoleSpeechEngine {
    words_per_minute: u32,
    current: Option<JoinHandle<()>>,
}

impl Default for ConsoleSpeechEngine {
    fn default() -> Self {
        Self::new(180)
    }
}

impl ConsoleSpeechEngine {
    #[must_use]
    pub const fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute,
            current: None,
        }
    }

    /// Rough time a voice needs to say `text`
    #[must_use]
    pub fn estimate(&self, text: &str) -> Duration {
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        let millis = u64::from(words) * 60_000 / u64::from(self.words_per_minute.max(1));
        Duration::from_millis(millis.max(300))
    }
}

impl SpeechEngine for ConsoleSpeechEngine {
    fn speak(&mut self, utterance: &Utterance, done: CompletionNotifier) {
        self.cancel();

        println!("[{}] {}", utterance.source, utterance.text);
        let duration = self.estimate(&utterance.text);

        self.current = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            done.finished();
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.current.take() {
            task.abort();
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Synthesizes speech remotely and plays it on the default output device
pub struct SynthesizedSpeechEngine {
    tts: Arc<TextToSpeech>,
    playback: AudioPlayback,
    current: Option<(JoinHandle<()>, Arc<AtomicBool>)>,
}

impl SynthesizedSpeechEngine {
    #[must_use]
    pub fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self {
            tts: Arc::new(tts),
            playback,
            current: None,
        }
    }
}

impl SpeechEngine for SynthesizedSpeechEngine {
    fn speak(&mut self, utterance: &Utterance, done: CompletionNotifier) {
        self.cancel();

        let tts = Arc::clone(&self.tts);
        let playback = self.playback.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let text = utterance.text.clone();
        let id = utterance.id;

        let task = tokio::spawn(async move {
            let audio = match tts.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(id, error = %e, "speech synthesis failed");
                    done.finished();
                    return;
                }
            };

            if stop_flag.load(Ordering::Relaxed) {
                return;
            }

            let played =
                tokio::task::spawn_blocking(move || playback.play_mp3(&audio, &stop_flag)).await;
            match played {
                Ok(Ok(true)) => done.finished(),
                Ok(Ok(false)) => tracing::debug!(id, "playback stopped early"),
                Ok(Err(e)) => {
                    tracing::warn!(id, error = %e, "playback failed");
                    done.finished();
                }
                Err(e) => tracing::warn!(id, error = %e, "playback task failed"),
            }
        });

        self.current = Some((task, stop));
    }

    fn cancel(&mut self) {
        if let Some((task, stop)) = self.current.take() {
            stop.store(true, Ordering::Relaxed);
            task.abort();
        }
    }

    fn name(&self) -> &'static str {
        "synthesized"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_scales_with_words() {
        let engine = ConsoleSpeechEngine::new(120);
        assert_eq!(engine.estimate("one two three four"), Duration::from_secs(2));
    }

    #[test]
    fn test_estimate_has_floor() {
        let engine = ConsoleSpeechEngine::default();
        assert_eq!(engine.estimate("hi"), Duration::from_millis(333));
        assert_eq!(engine.estimate(""), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_engine_completes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = ConsoleSpeechEngine::default();
        let utterance = Utterance {
            id: 7,
            text: "Turn left".to_string(),
            source: SpeechSource::Navigation,
        };

        engine.speak(&utterance, CompletionNotifier::new(7, tx));
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_engine_cancel_suppresses_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = ConsoleSpeechEngine::default();
        let utterance = Utterance {
            id: 1,
            text: "Turn right onto Main Street".to_string(),
            source: SpeechSource::Navigation,
        };

        engine.speak(&utterance, CompletionNotifier::new(1, tx));
        engine.cancel();

        // Aborted task drops the only sender
        assert_eq!(rx.recv().await, None);
    }
}
