//! HTTP API for the companion device
//!
//! The phone (or a simulator) pushes sensor data and user actions here and
//! follows state changes over the event stream.

pub mod dictation;
pub mod events;
pub mod health;
pub mod navigation;
pub mod sensors;
pub mod vision;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::events::EventBus;
use crate::features::FeatureGate;
use crate::haptics::DepthFeed;
use crate::navigation::{Coordinate, LocationLabels, NavigationHandle};
use crate::speech::SpeechHandle;
use crate::vision::{SharedFrameSlot, VisionAssistPipeline};
use crate::voice::DictationHandle;

/// Shared state for API handlers
pub struct ApiState {
    pub navigation: NavigationHandle,
    /// Latest fix, read by the location labeler
    pub fixes: watch::Sender<Option<Coordinate>>,
    pub labels: LocationLabels,
    pub speech: SpeechHandle,
    pub features: Arc<FeatureGate>,
    /// Absent when obstacle sensing could not start
    pub depth: Option<DepthFeed>,
    pub frames: SharedFrameSlot,
    /// Absent without an `OpenAI` API key
    pub vision: Option<Arc<VisionAssistPipeline>>,
    pub dictation: DictationHandle,
    pub events: EventBus,
}

/// Build the router with all routes
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(navigation::router(Arc::clone(&state)))
        .merge(sensors::router(Arc::clone(&state)))
        .merge(vision::router(Arc::clone(&state)))
        .nest("/dictation", dictation::router(Arc::clone(&state)))
        .merge(events::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    bind: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: Arc<ApiState>, bind: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            bind: bind.into(),
            port,
        }
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.bind, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(addr = %addr, "API server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// API errors
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotConfigured(&'static str),
    Pathsense(crate::Error),
}

impl From<crate::Error> for ApiError {
    fn from(error: crate::Error) -> Self {
        Self::Pathsense(error)
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        use crate::Error;

        let error = match self {
            Self::BadRequest(msg) => return (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::NotConfigured(msg) => {
                return (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string());
            }
            Self::Pathsense(error) => error,
        };

        let (status, code) = match &error {
            Error::EmptyInput(_) => (StatusCode::BAD_REQUEST, "empty_input"),
            Error::InvalidFrame(_) => (StatusCode::BAD_REQUEST, "invalid_frame"),
            Error::PermissionDenied(_) => (StatusCode::FORBIDDEN, "permission_denied"),
            Error::GeocodeNotFound(_) | Error::RouteNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Error::LocationUnavailable => (StatusCode::CONFLICT, "location_unavailable"),
            Error::DuplicateDestination(_) => (StatusCode::CONFLICT, "already_navigating"),
            Error::Network(_) | Error::Http(_) | Error::MalformedResponse(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_failed")
            }
            Error::DescriptionUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "description_unavailable")
            }
            Error::SensorUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "sensor_unavailable"),
            Error::Stopped(_) => (StatusCode::SERVICE_UNAVAILABLE, "stopped"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        (status, code, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, message = %message, "request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}

/// Body for endpoints that report whether input was taken
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub accepted: bool,
}
