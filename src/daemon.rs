//! Daemon - the main navigation service
//!
//! Wires the speech arbiter, navigation tracker, obstacle monitor, vision
//! pipeline and dictation together and serves them over HTTP.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::watch;

use crate::api::{ApiServer, ApiState};
use crate::config::SpeechEngineKind;
use crate::events::EventBus;
use crate::features::{Feature, FeatureGate, FeatureStatus};
use crate::haptics::{DepthFeed, LogActuator, ObstacleMonitor, spawn_actuator};
use crate::navigation::{
    GeocodingService, LocationLabeler, NavigationProgressTracker, NominatimGeocoder, OsrmRouter,
    RoutingService,
};
use crate::speech::{
    AudioPlayback, ConsoleSpeechEngine, SpeechEngine, SynthesizedSpeechEngine, TextToSpeech,
    spawn_arbiter,
};
use crate::vision::{OpenAiVisionClient, SharedFrameSlot, VisionAssistPipeline};
use crate::voice::spawn_dictation;
use crate::{Config, Result};

/// Pending commands the tracker buffers before fixes are dropped
const NAVIGATION_QUEUE: usize = 32;

/// Pulses buffered for the actuator
const HAPTIC_QUEUE: usize = 4;

/// Depth frames buffered for the monitor thread; one in flight at most
const DEPTH_QUEUE: usize = 1;

/// The pathsense daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Pick the speech engine, falling back to the console
    fn speech_engine(&self) -> Box<dyn SpeechEngine> {
        let speech = &self.config.speech;
        let console = || -> Box<dyn SpeechEngine> {
            Box::new(ConsoleSpeechEngine::new(speech.words_per_minute))
        };

        if !speech.enabled || speech.engine == SpeechEngineKind::Console {
            tracing::info!("speech on console");
            return console();
        }

        let Some(key) = self.config.api_keys.openai.clone() else {
            tracing::warn!("no OPENAI_API_KEY, speech on console");
            return console();
        };

        let engine = TextToSpeech::new(
            SecretString::from(key),
            speech.tts_voice.clone(),
            speech.tts_speed,
            speech.tts_model.clone(),
        )
        .and_then(|tts| {
            AudioPlayback::new().map(|playback| SynthesizedSpeechEngine::new(tts, playback))
        });

        match engine {
            Ok(engine) => {
                tracing::info!(
                    voice = %speech.tts_voice,
                    model = %speech.tts_model,
                    "speech synthesized"
                );
                Box::new(engine)
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis unavailable, speech on console");
                console()
            }
        }
    }

    fn vision_client(&self) -> Result<Option<OpenAiVisionClient>> {
        let Some(key) = self.config.api_keys.openai.clone() else {
            tracing::warn!("no OPENAI_API_KEY, scene descriptions disabled");
            return Ok(None);
        };

        let client = OpenAiVisionClient::new(
            SecretString::from(key),
            self.config.vision.model.clone(),
            self.config.vision.request_timeout,
        )?;
        tracing::info!(model = client.model(), "vision client initialized");
        Ok(Some(client))
    }

    /// Start every subsystem and build the API state
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built
    pub fn start(&self) -> Result<Arc<ApiState>> {
        let config = &self.config;
        let events = EventBus::default();

        let (speech, _arbiter) = spawn_arbiter(self.speech_engine(), events.clone());
        let features = Arc::new(FeatureGate::new(speech.clone()));

        let routing: Arc<dyn RoutingService> = Arc::new(OsrmRouter::new(
            config.services.osrm_url.clone(),
            config.services.timeout,
        )?);
        let geocoder: Arc<dyn GeocodingService> = Arc::new(NominatimGeocoder::new(
            config.services.nominatim_url.clone(),
            config.services.timeout,
        )?);

        let tracker = NavigationProgressTracker::new(
            config.navigation,
            routing,
            Arc::clone(&geocoder),
            speech.clone(),
            events.clone(),
        );
        let (navigation, _tracker) = tracker.spawn(NAVIGATION_QUEUE);

        let (fixes, fix_rx) = watch::channel(None);
        let labeler = LocationLabeler::new(geocoder, config.labeler);
        let labels = labeler.labels();
        let _labeler = labeler.spawn(fix_rx);

        let depth = self.start_obstacle_monitor(&features);

        let frames = SharedFrameSlot::new();
        let vision = self.vision_client()?.map(|client| {
            Arc::new(VisionAssistPipeline::new(
                Arc::new(frames.clone()),
                Arc::new(client),
                navigation.subscribe(),
                labels.clone(),
                speech.clone(),
                config.vision.clone(),
            ))
        });

        let (dictation, _dictation) =
            spawn_dictation(config.dictation, Arc::clone(&features), navigation.clone());

        Ok(Arc::new(ApiState {
            navigation,
            fixes,
            labels,
            speech,
            features,
            depth,
            frames,
            vision,
            dictation,
            events,
        }))
    }

    fn start_obstacle_monitor(&self, features: &FeatureGate) -> Option<DepthFeed> {
        let (dispatcher, _actuator) = spawn_actuator(LogActuator::default(), HAPTIC_QUEUE);
        let monitor =
            ObstacleMonitor::new(self.config.focus_region, self.config.haptics, dispatcher);

        match monitor.spawn(DEPTH_QUEUE) {
            Ok((feed, _thread)) => Some(feed),
            Err(e) => {
                tracing::error!(error = %e, "failed to start depth monitor");
                features.report(Feature::DepthSensor, FeatureStatus::Unavailable);
                None
            }
        }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    pub async fn run(self) -> Result<()> {
        let state = self.start()?;
        tracing::info!(
            port = self.config.server.port,
            vision = state.vision.is_some(),
            "daemon running"
        );

        let api = ApiServer::new(state, self.config.server.bind.clone(), self.config.server.port);
        let mut server = api.spawn();

        tokio::select! {
            result = &mut server => {
                match result {
                    Ok(result) => result?,
                    Err(e) => tracing::error!(error = %e, "API server task failed"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for shutdown signal");
                }
                tracing::info!("shutdown requested");
                server.abort();
            }
        }

        Ok(())
    }
}
