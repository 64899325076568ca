//! Capture-to-narration pipeline

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use super::{FrameSource, NarrationContext, VisionLanguageModelClient, VisionRequest};
use crate::navigation::{LocationLabels, NavigationSnapshot};
use crate::speech::{SpeechHandle, SpeechRequest, SpeechSource};
use crate::{Error, Result};

const CAPTURED_MESSAGE: &str = "Image has been captured.";
const CONNECTION_MESSAGE: &str = "There seems to be a problem with your connection.";
pub(crate) const CAMERA_UNAVAILABLE_MESSAGE: &str = "The camera is not available.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Wait before announcing a failed request
    #[serde(with = "crate::timer::secs_f64")]
    pub fallback_delay: Duration,
    /// HTTP timeout for one request
    #[serde(with = "crate::timer::secs_f64")]
    pub request_timeout: Duration,
    /// A new capture aborts the previous unfinished request
    pub supersede_in_flight: bool,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 300,
            fallback_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            supersede_in_flight: true,
        }
    }
}

/// A capture whose description is still on its way
#[derive(Debug)]
pub struct Capture {
    pub id: Uuid,
    task: JoinHandle<Result<String>>,
}

impl Capture {
    /// Wait for the description
    ///
    /// # Errors
    ///
    /// Returns `DescriptionUnavailable` if the request failed or was superseded
    pub async fn outcome(self) -> Result<String> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::DescriptionUnavailable(
                "superseded by a newer capture".to_string(),
            )),
            Err(e) => Err(Error::DescriptionUnavailable(e.to_string())),
        }
    }
}

/// Turns a capture action into a spoken scene description
pub struct VisionAssistPipeline {
    frames: Arc<dyn FrameSource>,
    client: Arc<dyn VisionLanguageModelClient>,
    navigation: watch::Receiver<NavigationSnapshot>,
    labels: LocationLabels,
    speech: SpeechHandle,
    settings: VisionSettings,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl VisionAssistPipeline {
    #[must_use]
    pub fn new(
        frames: Arc<dyn FrameSource>,
        client: Arc<dyn VisionLanguageModelClient>,
        navigation: watch::Receiver<NavigationSnapshot>,
        labels: LocationLabels,
        speech: SpeechHandle,
        settings: VisionSettings,
    ) -> Self {
        Self {
            frames,
            client,
            navigation,
            labels,
            speech,
            settings,
            in_flight: Mutex::new(None),
        }
    }

    /// Capture the latest frame and start describing it
    ///
    /// The acknowledgement is spoken before this returns; the description (or
    /// the connection fallback) is spoken by the background request.
    ///
    /// # Errors
    ///
    /// Returns `SensorUnavailable` if there is no frame; nothing is sent
    pub async fn capture(&self) -> Result<Capture> {
        let frame = match self.frames.latest_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "capture without camera frame");
                self.speech.speak(SpeechRequest::interrupting(
                    SpeechSource::Vision,
                    CAMERA_UNAVAILABLE_MESSAGE,
                ));
                return Err(e);
            }
        };

        let context = {
            let snapshot = self.navigation.borrow();
            NarrationContext::from_snapshot(&snapshot, self.labels.current().as_deref())
        };

        let request = VisionRequest {
            prompt: context.prompt(),
            image_data_uri: frame.data_uri(),
            max_tokens: self.settings.max_tokens,
        };

        let id = Uuid::new_v4();
        tracing::info!(
            %id,
            contextual = matches!(context, NarrationContext::Contextual { .. }),
            bytes = frame.jpeg().len(),
            "image captured"
        );
        self.speech.speak(SpeechRequest::interrupting(
            SpeechSource::Vision,
            CAPTURED_MESSAGE,
        ));

        let client = Arc::clone(&self.client);
        let speech = self.speech.clone();
        let fallback_delay = self.settings.fallback_delay;

        let task = tokio::spawn(async move {
            match client.describe(&request).await {
                Ok(description) => {
                    speech.speak(SpeechRequest::polite(
                        SpeechSource::Vision,
                        description.clone(),
                    ));
                    Ok(description)
                }
                Err(e) => {
                    tracing::warn!(
                        %id,
                        client = client.name(),
                        error = %e,
                        "scene description failed"
                    );
                    tokio::time::sleep(fallback_delay).await;
                    speech.speak(SpeechRequest::polite(
                        SpeechSource::Vision,
                        CONNECTION_MESSAGE,
                    ));
                    Err(e)
                }
            }
        });

        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task.abort_handle());
        if self.settings.supersede_in_flight
            && let Some(previous) = previous
            && !previous.is_finished()
        {
            tracing::debug!(%id, "superseding previous capture");
            previous.abort();
        }

        Ok(Capture { id, task })
    }
}
