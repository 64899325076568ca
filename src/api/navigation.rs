//! Destination requests and navigation state

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::navigation::{NavigationSnapshot, RouteOutcome};

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/navigation", get(snapshot))
        .route("/navigation/destination", post(request_destination))
        .with_state(state)
}

/// Current tracker snapshot
async fn snapshot(State(state): State<Arc<ApiState>>) -> Json<NavigationSnapshot> {
    Json(state.navigation.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct DestinationRequest {
    pub destination: String,
}

/// Start navigating to a typed destination
///
/// Waits for geocoding and routing. The outcome is also spoken.
async fn request_destination(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<DestinationRequest>,
) -> Result<Json<RouteOutcome>, ApiError> {
    let outcome = state.navigation.request_route(request.destination).await?;
    Ok(Json(outcome))
}
