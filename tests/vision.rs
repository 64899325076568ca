//! Vision assist pipeline integration tests

use std::sync::Arc;
use std::time::Duration;

use pathsense::Error;
use pathsense::navigation::{LocationLabels, NavigationPhase, NavigationSnapshot};
use pathsense::speech::{SpeechHandle, SpeechRequest, SpeechSource};
use pathsense::vision::{
    CapturedFrame, SharedFrameSlot, VisionAssistPipeline, VisionLanguageModelClient,
    VisionSettings,
};
use tokio::sync::{mpsc, watch};

mod common;
use common::{ScriptedVisionClient, TINY_JPEG, drain};

struct Harness {
    pipeline: VisionAssistPipeline,
    frames: SharedFrameSlot,
    client: Arc<ScriptedVisionClient>,
    speech: mpsc::UnboundedReceiver<SpeechRequest>,
    navigation: watch::Sender<NavigationSnapshot>,
}

fn harness(client: ScriptedVisionClient, label: Option<&str>) -> Harness {
    let frames = SharedFrameSlot::new();
    let client = Arc::new(client);
    let (speech_handle, speech) = SpeechHandle::channel();
    let (navigation, snapshots) = watch::channel(NavigationSnapshot::default());

    let pipeline = VisionAssistPipeline::new(
        Arc::new(frames.clone()),
        client.clone() as Arc<dyn VisionLanguageModelClient>,
        snapshots,
        LocationLabels::fixed(label.map(str::to_string)),
        speech_handle,
        VisionSettings::default(),
    );

    Harness {
        pipeline,
        frames,
        client,
        speech,
        navigation,
    }
}

fn with_frame(h: &Harness) {
    h.frames
        .store(CapturedFrame::from_jpeg(TINY_JPEG.to_vec()).unwrap());
}

#[tokio::test]
async fn test_capture_without_frame_speaks_camera_unavailable() {
    let mut h = harness(ScriptedVisionClient::answering("unused"), None);

    let result = h.pipeline.capture().await;
    assert!(matches!(result, Err(Error::SensorUnavailable(_))));
    assert!(h.client.requests.lock().unwrap().is_empty());

    let spoken = drain(&mut h.speech);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "The camera is not available.");
    assert_eq!(spoken[0].source, SpeechSource::Vision);
}

#[tokio::test]
async fn test_description_spoken_after_acknowledgement() {
    let mut h = harness(
        ScriptedVisionClient::answering("A bicycle is parked on the sidewalk ahead."),
        Some("221 Baker Street, London"),
    );
    with_frame(&h);

    let capture = h.pipeline.capture().await.unwrap();
    let ack = drain(&mut h.speech);
    assert_eq!(ack.len(), 1);
    assert_eq!(ack[0].text, "Image has been captured.");
    assert!(ack[0].interrupt);

    assert_eq!(
        capture.outcome().await.unwrap(),
        "A bicycle is parked on the sidewalk ahead."
    );
    let spoken = drain(&mut h.speech);
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "A bicycle is parked on the sidewalk ahead.");
    assert!(!spoken[0].interrupt);

    let prompt = h.client.last_prompt().unwrap();
    assert!(prompt.contains("Using the road: Baker Street, London,"));
    assert!(!prompt.contains("221"));
    assert!(prompt.contains("1 or 2 sentences"));

    let request = h.client.requests.lock().unwrap()[0].clone();
    assert!(request.image_data_uri.starts_with("data:image/jpeg;base64,"));
    assert_eq!(request.max_tokens, 300);
}

#[tokio::test]
async fn test_prompt_uses_route_while_navigating() {
    let h = harness(
        ScriptedVisionClient::answering("The crossing light is red."),
        Some("Main Street"),
    );
    with_frame(&h);
    h.navigation.send_replace(NavigationSnapshot {
        phase: NavigationPhase::Navigating,
        destination: Some("Central Library".to_string()),
        step_index: Some(0),
        step_count: 2,
        current_instruction: Some("Head north on Main Street".to_string()),
        next_instruction: Some("Turn left onto Oak Avenue".to_string()),
        last_fix: None,
    });

    h.pipeline.capture().await.unwrap().outcome().await.unwrap();

    let prompt = h.client.last_prompt().unwrap();
    assert!(prompt.contains(
        "the instructions: Head north on Main Street and then Turn left onto Oak Avenue"
    ));
    assert!(prompt.contains("the user's destination: Central Library"));
    assert!(prompt.contains("2 or 3 sentences"));
}

#[tokio::test(start_paused = true)]
async fn test_failure_announced_after_delay() {
    let mut h = harness(ScriptedVisionClient::failing(), Some("Main Street"));
    with_frame(&h);

    let capture = h.pipeline.capture().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let early = drain(&mut h.speech);
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].text, "Image has been captured.");

    assert!(matches!(
        capture.outcome().await,
        Err(Error::DescriptionUnavailable(_))
    ));
    let spoken = drain(&mut h.speech);
    assert_eq!(spoken.len(), 1);
    assert_eq!(
        spoken[0].text,
        "There seems to be a problem with your connection."
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_capture_supersedes_request_in_flight() {
    let client = ScriptedVisionClient {
        delay: Duration::from_secs(1),
        ..ScriptedVisionClient::new(vec![Ok("Second scene.".to_string())])
    };
    let mut h = harness(client, None);
    with_frame(&h);

    let first = h.pipeline.capture().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = h.pipeline.capture().await.unwrap();
    assert_ne!(first.id, second.id);

    assert!(matches!(
        first.outcome().await,
        Err(Error::DescriptionUnavailable(_))
    ));
    assert_eq!(second.outcome().await.unwrap(), "Second scene.");

    let texts: Vec<String> = drain(&mut h.speech).into_iter().map(|r| r.text).collect();
    assert_eq!(
        texts,
        [
            "Image has been captured.",
            "Image has been captured.",
            "Second scene."
        ]
    );
}
