//! Spoken destination entry

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;

use super::ApiState;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/transcript", post(transcript))
        .route("/stop", post(stop))
        .with_state(state)
}

async fn start(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.dictation.start();
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
pub struct TranscriptUpdate {
    pub text: String,
}

/// Latest partial transcript from the recognizer
async fn transcript(
    State(state): State<Arc<ApiState>>,
    Json(update): Json<TranscriptUpdate>,
) -> StatusCode {
    state.dictation.transcript(update.text);
    StatusCode::ACCEPTED
}

async fn stop(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.dictation.stop();
    StatusCode::ACCEPTED
}
