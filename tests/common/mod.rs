//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pathsense::navigation::{Coordinate, GeocodingService, Place, RoutePlan, RoutingService, Step};
use pathsense::speech::{CompletionNotifier, SpeechEngine, SpeechRequest, Utterance};
use pathsense::vision::{VisionLanguageModelClient, VisionRequest};
use pathsense::{Error, Result};
use tokio::sync::mpsc;

/// A fix in central Berlin, roughly 1 km from the route waypoints
pub const START: Coordinate = Coordinate::new(52.5200, 13.4050);

/// Waypoints about 100 m apart heading north from [`START`]
pub fn waypoints() -> [Coordinate; 3] {
    [
        Coordinate::new(52.5290, 13.4050),
        Coordinate::new(52.5299, 13.4050),
        Coordinate::new(52.5308, 13.4050),
    ]
}

/// Three-step route plan ending in a blank arrival step
pub fn three_step_plan() -> RoutePlan {
    let [a, b, c] = waypoints();
    let step = |instruction: &str, waypoint: Coordinate| Step {
        instruction: instruction.to_string(),
        waypoint,
        path: vec![waypoint],
    };

    RoutePlan {
        steps: vec![
            step("Head north on Main Street", a),
            step("Turn left onto Oak Avenue", b),
            step("Turn right onto Elm Street", c),
            step("", c),
        ],
        path: vec![START, a, b, c],
    }
}

/// Routing service that answers from a script and records its calls
#[derive(Default)]
pub struct RecordingRouting {
    pub calls: Mutex<Vec<(Coordinate, Coordinate)>>,
    pub plan: Mutex<Option<RoutePlan>>,
    pub delay: Option<Duration>,
}

impl RecordingRouting {
    pub fn with_plan(plan: RoutePlan) -> Self {
        Self {
            plan: Mutex::new(Some(plan)),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RoutingService for RecordingRouting {
    async fn walking_route(
        &self,
        source: Coordinate,
        destination: Coordinate,
    ) -> Result<RoutePlan> {
        self.calls.lock().unwrap().push((source, destination));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.plan
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::RouteNotFound("scripted".to_string()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Geocoder that knows a fixed set of places
#[derive(Default)]
pub struct RecordingGeocoder {
    pub places: Vec<(String, Coordinate)>,
    pub reverse_label: Option<String>,
    pub forward_calls: Mutex<Vec<String>>,
    pub reverse_calls: Mutex<Vec<Coordinate>>,
}

impl RecordingGeocoder {
    pub fn knowing(name: &str, coordinate: Coordinate) -> Self {
        Self {
            places: vec![(name.to_string(), coordinate)],
            reverse_label: Some("12 Main Street, Berlin".to_string()),
            ..Self::default()
        }
    }

    pub fn forward_count(&self) -> usize {
        self.forward_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GeocodingService for RecordingGeocoder {
    async fn forward(&self, address: &str) -> Result<Place> {
        self.forward_calls.lock().unwrap().push(address.to_string());
        self.places
            .iter()
            .find(|(name, _)| name == address)
            .map(|(name, coordinate)| Place {
                coordinate: *coordinate,
                label: name.clone(),
            })
            .ok_or_else(|| Error::GeocodeNotFound(address.to_string()))
    }

    async fn reverse(&self, coordinate: Coordinate) -> Result<String> {
        self.reverse_calls.lock().unwrap().push(coordinate);
        self.reverse_label
            .clone()
            .ok_or_else(|| Error::GeocodeNotFound(coordinate.to_string()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Vision client that replays scripted answers and records requests
pub struct ScriptedVisionClient {
    pub answers: Mutex<Vec<Result<String>>>,
    pub requests: Mutex<Vec<VisionRequest>>,
    pub delay: Duration,
}

impl ScriptedVisionClient {
    pub fn answering(answer: &str) -> Self {
        Self::new(vec![Ok(answer.to_string())])
    }

    pub fn failing() -> Self {
        Self::new(vec![Err(Error::DescriptionUnavailable(
            "connection reset".to_string(),
        ))])
    }

    pub fn new(answers: Vec<Result<String>>) -> Self {
        Self {
            answers: Mutex::new(answers),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl VisionLanguageModelClient for ScriptedVisionClient {
    async fn describe(&self, request: &VisionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            return Err(Error::DescriptionUnavailable("script exhausted".to_string()));
        }
        answers.remove(0)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// What the recording engine saw
#[derive(Default)]
pub struct SpeechLog {
    pub spoken: Vec<Utterance>,
    pub cancels: usize,
    pub pending: Vec<CompletionNotifier>,
    pub cancelled: Vec<CompletionNotifier>,
}

/// Speech engine that never finishes on its own
///
/// Tests finish utterances through [`SpeechLog::pending`].
#[derive(Clone, Default)]
pub struct RecordingSpeechEngine {
    pub log: Arc<Mutex<SpeechLog>>,
}

impl RecordingSpeechEngine {
    pub fn texts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .spoken
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().unwrap().cancels
    }

    /// Complete the most recent utterance
    pub fn finish_current(&self) -> bool {
        match self.log.lock().unwrap().pending.pop() {
            Some(notifier) => {
                notifier.finished();
                true
            }
            None => false,
        }
    }

    /// Deliver late completions for utterances that were cancelled
    pub fn finish_cancelled(&self) -> usize {
        let cancelled = std::mem::take(&mut self.log.lock().unwrap().cancelled);
        let count = cancelled.len();
        for notifier in cancelled {
            notifier.finished();
        }
        count
    }
}

impl SpeechEngine for RecordingSpeechEngine {
    fn speak(&mut self, utterance: &Utterance, done: CompletionNotifier) {
        let mut log = self.log.lock().unwrap();
        log.spoken.push(utterance.clone());
        log.pending.clear();
        log.pending.push(done);
    }

    fn cancel(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.cancels += 1;
        let pending = std::mem::take(&mut log.pending);
        log.cancelled.extend(pending);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Drain every request currently queued for the speech channel
pub fn drain(rx: &mut mpsc::UnboundedReceiver<SpeechRequest>) -> Vec<SpeechRequest> {
    let mut requests = Vec::new();
    while let Ok(request) = rx.try_recv() {
        requests.push(request);
    }
    requests
}

/// Smallest buffer that passes the JPEG marker check
pub const TINY_JPEG: [u8; 6] = [0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9];

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
