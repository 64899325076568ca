//! Camera frames and capture requests

use std::sync::Arc;

use axum::{Json, Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use serde::Serialize;
use uuid::Uuid;

use super::{ApiError, ApiState};
use crate::features::Feature;
use crate::vision::CapturedFrame;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/camera/frame", post(store_frame))
        .route("/capture", post(capture))
        .with_state(state)
}

/// Replace the latest camera frame (raw JPEG body)
async fn store_frame(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.features.check(Feature::Camera)?;
    let frame = CapturedFrame::from_jpeg(body.to_vec())?;
    state.frames.store(frame);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    pub capture_id: Uuid,
}

/// Describe the scene in the latest frame
///
/// Returns once the acknowledgement is spoken; the description follows on
/// the speech channel. A camera the gate already reported stays silent.
async fn capture(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<CaptureResponse>), ApiError> {
    state.features.check(Feature::Camera)?;
    let vision = state
        .vision
        .as_ref()
        .ok_or(ApiError::NotConfigured("vision not configured (no OPENAI_API_KEY)"))?;

    let capture = vision.capture().await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CaptureResponse {
            capture_id: capture.id,
        }),
    ))
}
