//! Error types for pathsense

use thiserror::Error;

/// Result type alias for pathsense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pathsense
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A sensor (depth, camera) is missing or stopped delivering data
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// The user denied or restricted a permission (location, microphone)
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No location fix has been received yet
    #[error("location unavailable")]
    LocationUnavailable,

    /// Forward or reverse geocoding found nothing
    #[error("geocode not found: {0}")]
    GeocodeNotFound(String),

    /// Routing service returned no usable route
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// Transport failure or non-success status from an external service
    #[error("network error: {0}")]
    Network(String),

    /// External service answered with a body we could not use
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Vision-language model produced no usable description
    #[error("description unavailable: {0}")]
    DescriptionUnavailable(String),

    /// User input was empty or blank
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// Destination is already being navigated to
    #[error("already navigating to {0}")]
    DuplicateDestination(String),

    /// Sensor frame that cannot be used (bad depth geometry, non-JPEG image)
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A background task has shut down
    #[error("{0} stopped")]
    Stopped(&'static str),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
