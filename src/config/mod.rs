//! Configuration management for pathsense
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! environment variables. CLI flags are applied by the binary on top.

mod file;

pub use file::{PathsenseConfigFile, config_file_path, load_config_file};

use std::path::Path;
use std::time::Duration;

use crate::depth::FocusRegion;
use crate::haptics::HapticPolicy;
use crate::navigation::{
    DEFAULT_NOMINATIM_URL, DEFAULT_OSRM_URL, LabelerSettings, NavigationSettings,
};
use crate::vision::VisionSettings;
use crate::voice::DictationSettings;
use crate::{Error, Result};

/// Default API server port
pub const DEFAULT_PORT: u16 = 18800;

/// pathsense configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub haptics: HapticPolicy,
    pub focus_region: FocusRegion,
    pub navigation: NavigationSettings,
    pub labeler: LabelerSettings,
    pub vision: VisionSettings,
    pub dictation: DictationSettings,
    pub speech: SpeechConfig,
    pub services: ServicesConfig,
    pub server: ServerConfig,
    pub api_keys: ApiKeys,
}

/// Which engine voices the arbiter's utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechEngineKind {
    /// Print to stdout and simulate speaking time
    Console,
    /// Cloud TTS played through the audio device
    #[default]
    Synthesized,
}

impl std::str::FromStr for SpeechEngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "synthesized" | "tts" => Ok(Self::Synthesized),
            other => Err(Error::Config(format!("unknown speech engine: {other}"))),
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Use the audio device at all
    pub enabled: bool,
    pub engine: SpeechEngineKind,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
    pub words_per_minute: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: SpeechEngineKind::default(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 1.0,
            words_per_minute: 180,
        }
    }
}

/// Routing and geocoding endpoints
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    pub osrm_url: String,
    pub nominatim_url: String,
    pub timeout: Duration,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Server/runtime configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "127.0.0.1".to_string(),
        }
    }
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for vision and TTS)
    pub openai: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn load(path: Option<&Path>, disable_voice: bool) -> Result<Self> {
        let fc = load_config_file(path);
        Self::from_sources(fc, |key| std::env::var(key).ok(), disable_voice)
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn from_sources(
        fc: PathsenseConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Result<Self> {
        let defaults = Self::default();

        let engine = match fc.speech.engine.as_deref() {
            Some(engine) => engine.parse()?,
            None => defaults.speech.engine,
        };

        let speech = SpeechConfig {
            enabled: !disable_voice && fc.speech.enabled.unwrap_or(defaults.speech.enabled),
            engine,
            tts_model: fc.speech.tts_model.unwrap_or(defaults.speech.tts_model),
            tts_voice: fc.speech.tts_voice.unwrap_or(defaults.speech.tts_voice),
            tts_speed: fc.speech.tts_speed.unwrap_or(defaults.speech.tts_speed),
            words_per_minute: fc
                .speech
                .words_per_minute
                .unwrap_or(defaults.speech.words_per_minute),
        };

        let services = ServicesConfig {
            osrm_url: env("PATHSENSE_OSRM_URL")
                .or(fc.services.osrm_url)
                .unwrap_or(defaults.services.osrm_url),
            nominatim_url: env("PATHSENSE_NOMINATIM_URL")
                .or(fc.services.nominatim_url)
                .unwrap_or(defaults.services.nominatim_url),
            timeout: fc
                .services
                .timeout_secs
                .map_or(defaults.services.timeout, Duration::from_secs),
        };

        let server = ServerConfig {
            port: env("PATHSENSE_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(defaults.server.port),
            bind: fc.server.bind.unwrap_or(defaults.server.bind),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|key| !key.trim().is_empty()),
        };

        let config = Self {
            haptics: fc.haptics.unwrap_or_default(),
            focus_region: fc.depth.unwrap_or_default(),
            navigation: fc.navigation.unwrap_or_default(),
            labeler: fc.location.unwrap_or_default(),
            vision: fc.vision.unwrap_or_default(),
            dictation: fc.dictation.unwrap_or_default(),
            speech,
            services,
            server,
            api_keys,
        };
        config.validate()?;

        tracing::debug!(
            port = config.server.port,
            speech = config.speech.enabled,
            engine = ?config.speech.engine,
            osrm = %config.services.osrm_url,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        self.haptics.validate()?;
        self.navigation.validate()?;

        let region = &self.focus_region;
        if !(0.0..=1.0).contains(&region.center_x) || !(0.0..=1.0).contains(&region.center_y) {
            return Err(Error::Config(format!(
                "depth: focus center ({}, {}) must be fractions of the frame",
                region.center_x, region.center_y
            )));
        }

        if self.labeler.min_movement_m < 0.0 {
            return Err(Error::Config(
                "location: min movement cannot be negative".to_string(),
            ));
        }

        if self.vision.max_tokens == 0 {
            return Err(Error::Config("vision: max tokens must be positive".to_string()));
        }

        if self.dictation.silence_timeout.is_zero() {
            return Err(Error::Config(
                "dictation: silence timeout must be positive".to_string(),
            ));
        }

        if !(0.25..=4.0).contains(&self.speech.tts_speed) {
            return Err(Error::Config(format!(
                "speech: tts speed {} outside 0.25..=4.0",
                self.speech.tts_speed
            )));
        }

        for (name, value) in [
            ("osrm_url", &self.services.osrm_url),
            ("nominatim_url", &self.services.nominatim_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("services: {name} {value:?}: {e}")))?;
        }

        Ok(())
    }

    /// Whether the synthesized engine can be used
    #[must_use]
    pub const fn can_synthesize(&self) -> bool {
        self.speech.enabled
            && matches!(self.speech.engine, SpeechEngineKind::Synthesized)
            && self.api_keys.openai.is_some()
    }
}
