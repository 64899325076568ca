//! API endpoint integration tests

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use pathsense::api::ApiState;
use pathsense::depth::FocusRegion;
use pathsense::events::EventBus;
use pathsense::features::{Feature, FeatureGate, FeatureStatus};
use pathsense::haptics::{HapticDispatcher, HapticPolicy, ObstacleMonitor};
use pathsense::navigation::{LocationLabels, NavigationProgressTracker, NavigationSettings};
use pathsense::speech::{SpeechHandle, SpeechRequest};
use pathsense::vision::{
    SharedFrameSlot, VisionAssistPipeline, VisionLanguageModelClient, VisionSettings,
};
use pathsense::voice::{DictationSettings, spawn_dictation};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tower::ServiceExt;

mod common;
use common::{
    RecordingGeocoder, RecordingRouting, START, ScriptedVisionClient, TINY_JPEG, drain,
    three_step_plan, waypoints,
};

struct TestApp {
    state: Arc<ApiState>,
    speech: mpsc::UnboundedReceiver<SpeechRequest>,
}

impl TestApp {
    fn router(&self) -> Router {
        pathsense::api::router(Arc::clone(&self.state))
    }
}

#[derive(Default)]
struct Options {
    with_depth: bool,
    with_vision: bool,
}

fn build_test_app(options: Options) -> TestApp {
    let [_, _, library] = waypoints();
    let (speech, speech_rx) = SpeechHandle::channel();
    let events = EventBus::default();
    let features = Arc::new(FeatureGate::new(speech.clone()));

    let tracker = NavigationProgressTracker::new(
        NavigationSettings::default(),
        Arc::new(RecordingRouting::with_plan(three_step_plan())),
        Arc::new(RecordingGeocoder::knowing("Central Library", library)),
        speech.clone(),
        events.clone(),
    );
    let snapshots = tracker.watch();
    let (navigation, _task) = tracker.spawn(8);

    let depth = options.with_depth.then(|| {
        let (tx, _rx) = mpsc::channel(4);
        let monitor = ObstacleMonitor::new(
            FocusRegion::default(),
            HapticPolicy::default(),
            HapticDispatcher::new(tx),
        );
        monitor.spawn(1).unwrap().0
    });

    let frames = SharedFrameSlot::new();
    let labels = LocationLabels::fixed(Some("12 Main Street, Berlin".to_string()));
    let vision = options.with_vision.then(|| {
        Arc::new(VisionAssistPipeline::new(
            Arc::new(frames.clone()),
            Arc::new(ScriptedVisionClient::answering("The path is clear."))
                as Arc<dyn VisionLanguageModelClient>,
            snapshots,
            labels.clone(),
            speech.clone(),
            VisionSettings::default(),
        ))
    });

    let (dictation, _task) = spawn_dictation(
        DictationSettings::default(),
        Arc::clone(&features),
        navigation.clone(),
    );
    let (fixes, _) = watch::channel(None);

    TestApp {
        state: Arc::new(ApiState {
            navigation,
            fixes,
            labels,
            speech,
            features,
            depth,
            frames,
            vision,
            dictation,
            events,
        }),
        speech: speech_rx,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(Options::default());

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_navigation_idle_snapshot() {
    let app = build_test_app(Options::default());

    let (status, json) = send(&app, get("/navigation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "idle");
    assert!(json["destination"].is_null());
}

#[tokio::test]
async fn test_destination_errors() {
    let app = build_test_app(Options::default());

    let (status, json) = send(
        &app,
        post_json("/navigation/destination", &json!({"destination": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "empty_input");

    let (status, json) = send(
        &app,
        post_json("/navigation/destination", &json!({"destination": "Central Library"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "location_unavailable");
}

#[tokio::test]
async fn test_location_then_destination_starts_route() {
    let app = build_test_app(Options::default());

    let (status, json) = send(
        &app,
        post_json(
            "/location",
            &json!({"latitude": START.latitude, "longitude": START.longitude}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["accepted"], true);

    let (status, json) = send(
        &app,
        post_json("/navigation/destination", &json!({"destination": "Central Library"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "started");
    assert_eq!(json["steps"], 3);

    let (_, json) = send(&app, get("/navigation")).await;
    assert_eq!(json["phase"], "navigating");
    assert_eq!(json["current_instruction"], "Head north on Main Street");

    let (_, json) = send(&app, get("/location")).await;
    assert_eq!(json["label"], "12 Main Street, Berlin");
    assert_eq!(json["last_fix"]["latitude"], START.latitude);
}

#[tokio::test]
async fn test_location_rejected_when_invalid_or_denied() {
    let mut app = build_test_app(Options::default());

    let (status, _) = send(
        &app,
        post_json("/location", &json!({"latitude": 123.0, "longitude": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        post_json(
            "/sensors/status",
            &json!({"feature": "location", "status": "denied"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["disabled"], true);

    let spoken = drain(&mut app.speech);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, Feature::Location.disabled_message());

    let (status, json) = send(
        &app,
        post_json(
            "/location",
            &json!({"latitude": START.latitude, "longitude": START.longitude}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "permission_denied");
}

#[tokio::test]
async fn test_sensor_status_lists_features() {
    let app = build_test_app(Options::default());
    app.state
        .features
        .report(Feature::Microphone, FeatureStatus::Restricted);

    let (status, json) = send(&app, get("/sensors/status")).await;
    assert_eq!(status, StatusCode::OK);
    let features = json.as_array().unwrap();
    assert_eq!(features.len(), 4);
    let microphone = features
        .iter()
        .find(|f| f["feature"] == "microphone")
        .unwrap();
    assert_eq!(microphone["enabled"], false);
    let camera = features.iter().find(|f| f["feature"] == "camera").unwrap();
    assert_eq!(camera["enabled"], true);
}

#[tokio::test]
async fn test_depth_upload() {
    let app = build_test_app(Options::default());
    let frame = json!({"width": 2, "height": 2, "distances": [1.0, null, 2.0, 3.0]});

    let (status, json) = send(&app, post_json("/depth", &frame)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "not_configured");

    let app = build_test_app(Options {
        with_depth: true,
        ..Options::default()
    });
    let (status, json) = send(&app, post_json("/depth", &frame)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(json["accepted"].is_boolean());

    let short = json!({"width": 4, "height": 4, "distances": [1.0]});
    let (status, json) = send(&app, post_json("/depth", &short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_frame");

    let stride = 1_u64 << 63;
    let huge_stride = json!({"width": 1, "height": 3, "row_stride": stride, "distances": [1.0]});
    let (status, json) = send(&app, post_json("/depth", &huge_stride)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_frame");

    send(
        &app,
        post_json(
            "/sensors/status",
            &json!({"feature": "depth_sensor", "status": "unavailable"}),
        ),
    )
    .await;
    assert!(!app.state.depth.as_ref().unwrap().is_enabled());
    let (status, _) = send(&app, post_json("/depth", &frame)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_camera_frame_must_be_jpeg() {
    let app = build_test_app(Options::default());

    let request = Request::builder()
        .method("POST")
        .uri("/camera/frame")
        .body(Body::from(&b"not an image"[..]))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "invalid_frame");

    let request = Request::builder()
        .method("POST")
        .uri("/camera/frame")
        .body(Body::from(TINY_JPEG.to_vec()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_capture_without_vision_not_configured() {
    let app = build_test_app(Options::default());

    let (status, json) = send(&app, post_empty("/capture")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test]
async fn test_capture_with_frame_accepted() {
    let mut app = build_test_app(Options {
        with_vision: true,
        ..Options::default()
    });

    let (status, json) = send(&app, post_empty("/capture")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "sensor_unavailable");

    let frame = Request::builder()
        .method("POST")
        .uri("/camera/frame")
        .body(Body::from(TINY_JPEG.to_vec()))
        .unwrap();
    send(&app, frame).await;

    let (status, json) = send(&app, post_empty("/capture")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(json["capture_id"].is_string());

    let spoken = drain(&mut app.speech);
    assert_eq!(spoken[0].text, "The camera is not available.");
    assert_eq!(spoken[1].text, "Image has been captured.");
}

#[tokio::test]
async fn test_capture_after_camera_report_stays_silent() {
    let mut app = build_test_app(Options {
        with_vision: true,
        ..Options::default()
    });

    let (status, _) = send(
        &app,
        post_json(
            "/sensors/status",
            &json!({"feature": "camera", "status": "unavailable"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    for _ in 0..2 {
        let (status, json) = send(&app, post_empty("/capture")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "sensor_unavailable");
    }

    let spoken = drain(&mut app.speech);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, Feature::Camera.disabled_message());
}

#[tokio::test]
async fn test_dictation_endpoints_accept_input() {
    let app = build_test_app(Options::default());

    for (uri, body) in [
        ("/dictation/start", None),
        ("/dictation/transcript", Some(json!({"text": "Central Library"}))),
        ("/dictation/stop", None),
    ] {
        let request = match body {
            Some(body) => post_json(uri, &body),
            None => post_empty(uri),
        };
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED, "{uri}");
    }
}
