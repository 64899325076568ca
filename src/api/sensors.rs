//! Location fixes, depth frames and permission reports

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{Accepted, ApiError, ApiState};
use crate::depth::DepthFrame;
use crate::features::{Feature, FeatureStatus};
use crate::navigation::Coordinate;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/location", get(location_label).post(update_location))
        .route("/location/readback", post(readback))
        .route("/depth", post(push_depth))
        .route("/sensors/status", get(sensor_status).post(report_status))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct LocationLabelResponse {
    pub label: Option<String>,
    pub last_fix: Option<Coordinate>,
}

async fn location_label(State(state): State<Arc<ApiState>>) -> Json<LocationLabelResponse> {
    Json(LocationLabelResponse {
        label: state.labels.current(),
        last_fix: *state.fixes.borrow(),
    })
}

/// Ingest a location fix
async fn update_location(
    State(state): State<Arc<ApiState>>,
    Json(fix): Json<Coordinate>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    state.features.check(Feature::Location)?;
    if !fix.is_valid() {
        return Err(ApiError::BadRequest(format!("coordinate out of range: {fix}")));
    }

    let accepted = state.navigation.update_location(fix);
    state.fixes.send_replace(Some(fix));
    Ok((StatusCode::ACCEPTED, Json(Accepted { accepted })))
}

/// Speak the current location label
async fn readback(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.labels.readback(&state.speech);
    StatusCode::ACCEPTED
}

/// Depth frame upload; `null` marks an invalid reading
#[derive(Debug, Deserialize)]
pub struct DepthUpload {
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub row_stride: Option<usize>,
    pub distances: Vec<Option<f32>>,
}

async fn push_depth(
    State(state): State<Arc<ApiState>>,
    Json(upload): Json<DepthUpload>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    state.features.check(Feature::DepthSensor)?;
    let feed = state
        .depth
        .as_ref()
        .ok_or(ApiError::NotConfigured("obstacle sensing is not running"))?;

    let distances = upload
        .distances
        .into_iter()
        .map(|d| d.unwrap_or(f32::NAN))
        .collect();
    let frame = DepthFrame::new(
        upload.width,
        upload.height,
        upload.row_stride.unwrap_or(upload.width),
        distances,
        Instant::now(),
    )?;

    let accepted = feed.push(frame);
    Ok((StatusCode::ACCEPTED, Json(Accepted { accepted })))
}

#[derive(Debug, Serialize)]
pub struct FeatureState {
    pub feature: Feature,
    pub enabled: bool,
}

async fn sensor_status(State(state): State<Arc<ApiState>>) -> Json<Vec<FeatureState>> {
    let features = [
        Feature::Location,
        Feature::Microphone,
        Feature::DepthSensor,
        Feature::Camera,
    ];
    Json(
        features
            .into_iter()
            .map(|feature| FeatureState {
                feature,
                enabled: state.features.is_enabled(feature),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
pub struct StatusReport {
    pub feature: Feature,
    pub status: FeatureStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusReportResponse {
    /// This report turned the feature off
    pub disabled: bool,
}

/// Permission or sensor availability change from the platform
async fn report_status(
    State(state): State<Arc<ApiState>>,
    Json(report): Json<StatusReport>,
) -> (StatusCode, Json<StatusReportResponse>) {
    let disabled = state.features.report(report.feature, report.status);

    if !state.features.is_enabled(report.feature) {
        match report.feature {
            Feature::DepthSensor => {
                if let Some(feed) = &state.depth {
                    feed.disable();
                }
            }
            Feature::Camera => state.frames.clear(),
            Feature::Location | Feature::Microphone => {}
        }
    }

    (StatusCode::ACCEPTED, Json(StatusReportResponse { disabled }))
}
