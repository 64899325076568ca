//! Server-sent event stream of navigation and speech events

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::ApiState;
use crate::events::{Event, StampedEvent};

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/events", get(events))
        .with_state(state)
}

async fn events(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(to_sse);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(
    received: std::result::Result<Event, BroadcastStreamRecvError>,
) -> Option<Result<SseEvent, Infallible>> {
    let event = match received {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "event subscriber lagged");
            return None;
        }
    };

    let name = match &event {
        Event::Navigation(_) => "navigation",
        Event::Speech(_) => "speech",
    };

    match SseEvent::default().event(name).json_data(StampedEvent::now(&event)) {
        Ok(sse) => Some(Ok(sse)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode event");
            None
        }
    }
}
