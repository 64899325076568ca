//! TOML configuration file loading
//!
//! Supports `~/.config/pathsense/config.toml` as a persistent config source.
//! Every section is optional and overlays the built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::depth::FocusRegion;
use crate::haptics::HapticPolicy;
use crate::navigation::{LabelerSettings, NavigationSettings};
use crate::vision::VisionSettings;
use crate::voice::DictationSettings;

/// Top-level TOML configuration file schema
///
/// Tuning sections (`haptics`, `depth`, `navigation`, `location`, `vision`,
/// `dictation`) fill missing keys from their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PathsenseConfigFile {
    #[serde(default)]
    pub haptics: Option<HapticPolicy>,

    /// Depth focus region
    #[serde(default)]
    pub depth: Option<FocusRegion>,

    #[serde(default)]
    pub navigation: Option<NavigationSettings>,

    /// Reverse-geocoding label cache
    #[serde(default)]
    pub location: Option<LabelerSettings>,

    #[serde(default)]
    pub vision: Option<VisionSettings>,

    #[serde(default)]
    pub dictation: Option<DictationSettings>,

    /// Speech output
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Routing and geocoding endpoints
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Speech output configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Speak through the audio device
    pub enabled: Option<bool>,

    /// "console" or "synthesized"
    pub engine: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice (e.g. "alloy", "nova")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Pacing of the console engine
    pub words_per_minute: Option<u32>,
}

/// External service endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// OSRM base URL
    pub osrm_url: Option<String>,

    /// Nominatim base URL
    pub nominatim_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Bind address
    pub bind: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the config file, falling back to defaults if absent or broken
///
/// An explicit `path` wins over the standard location.
#[must_use]
pub fn load_config_file(path: Option<&Path>) -> PathsenseConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return PathsenseConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return PathsenseConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                PathsenseConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            PathsenseConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/pathsense/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("pathsense").join("config.toml"))
}
