//! Depth-to-haptics integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use pathsense::depth::{DepthFrame, DepthFrameProcessor, FocusRegion};
use pathsense::haptics::{
    HapticActuator, HapticAlertScheduler, HapticDispatcher, HapticEvent, HapticPolicy,
    ObstacleMonitor, spawn_actuator,
};
use tokio::sync::mpsc;

const WIDTH: usize = 160;
const HEIGHT: usize = 120;

/// Frame with `far` everywhere except a block of `near` at the focus center
fn frame_with_obstacle(near: f32, far: f32, at: Instant) -> DepthFrame {
    let mut distances = vec![far; WIDTH * HEIGHT];
    let cx = WIDTH / 4;
    let cy = HEIGHT / 2;
    for y in cy - 2..=cy + 2 {
        for x in cx - 2..=cx + 2 {
            distances[y * WIDTH + x] = near;
        }
    }
    DepthFrame::new(WIDTH, HEIGHT, WIDTH, distances, at).unwrap()
}

#[test]
fn test_obstacle_outside_region_ignored() {
    let processor = DepthFrameProcessor::new(FocusRegion::default());
    let now = Instant::now();

    let mut distances = vec![4.0; WIDTH * HEIGHT];
    // Right half of the frame is outside the focus region
    distances[HEIGHT / 2 * WIDTH + WIDTH - 10] = 0.5;
    let frame = DepthFrame::new(WIDTH, HEIGHT, WIDTH, distances, now).unwrap();

    assert_eq!(processor.reduce(frame).meters(), Some(4.0));
    assert_eq!(
        processor
            .reduce(frame_with_obstacle(0.5, 4.0, now))
            .meters(),
        Some(0.5)
    );
}

#[test]
fn test_approaching_obstacle_pulses_faster() {
    let processor = DepthFrameProcessor::new(FocusRegion::default());
    let mut scheduler = HapticAlertScheduler::new(HapticPolicy::default());
    let start = Instant::now();

    // Walk from 8 m to 0.4 m over ten seconds at 30 frames per second
    let mut pulses: Vec<HapticEvent> = Vec::new();
    for i in 0..300_u32 {
        let at = start + Duration::from_millis(u64::from(i) * 1000 / 30);
        let distance = 8.0 - 7.6 * i as f32 / 300.0;
        let sample = processor.reduce(frame_with_obstacle(distance, 10.0, at));
        if let Some(event) = scheduler.on_sample(&sample, at) {
            pulses.push(event);
        }
    }

    assert!(pulses.len() > 5);
    for pair in pulses.windows(2) {
        let gap = pair[1].fired_at - pair[0].fired_at;
        assert!(gap >= pair[1].interval, "{gap:?} < {:?}", pair[1].interval);
        assert!(pair[1].interval <= pair[0].interval);
    }
}

#[test]
fn test_invalid_frames_do_not_reset_timing() {
    let processor = DepthFrameProcessor::new(FocusRegion::default());
    let mut scheduler = HapticAlertScheduler::new(HapticPolicy::default());
    let start = Instant::now();

    assert!(scheduler
        .on_sample(&processor.reduce(frame_with_obstacle(1.0, 1.0, start)), start)
        .is_some());

    // Sensor returns nothing usable for a while
    let blank_at = start + Duration::from_millis(100);
    let blank = DepthFrame::new(WIDTH, HEIGHT, WIDTH, vec![0.0; WIDTH * HEIGHT], blank_at).unwrap();
    assert!(scheduler.on_sample(&processor.reduce(blank), blank_at).is_none());

    let interval = HapticPolicy::default().interval_for(1.0);
    let just_before = start + interval - Duration::from_millis(1);
    assert!(scheduler
        .on_sample(&processor.reduce(frame_with_obstacle(1.0, 1.0, just_before)), just_before)
        .is_none());

    let due = start + interval;
    assert!(scheduler
        .on_sample(&processor.reduce(frame_with_obstacle(1.0, 1.0, due)), due)
        .is_some());
}

struct CountingActuator(Arc<AtomicUsize>);

impl HapticActuator for CountingActuator {
    fn fire_pulse(&mut self) -> pathsense::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test]
async fn test_monitor_thread_drives_actuator() {
    let pulses = Arc::new(AtomicUsize::new(0));
    let (dispatcher, actuator_task) = spawn_actuator(CountingActuator(pulses.clone()), 4);

    let monitor = ObstacleMonitor::new(FocusRegion::default(), HapticPolicy::default(), dispatcher);
    let (feed, thread) = monitor.spawn(1).unwrap();

    assert!(feed.push(frame_with_obstacle(0.5, 5.0, Instant::now())));
    drop(feed);
    tokio::task::spawn_blocking(move || thread.join().unwrap())
        .await
        .unwrap();

    // The monitor owned the last dispatcher, so the actuator task ends too
    actuator_task.await.unwrap();
    assert_eq!(pulses.load(Ordering::SeqCst), 1);
}

#[test]
fn test_full_dispatch_channel_discards_pulse() {
    let (tx, mut rx) = mpsc::channel(1);
    let dispatcher = HapticDispatcher::new(tx);
    let event = HapticEvent {
        fired_at: Instant::now(),
        interval: Duration::from_secs(1),
    };

    assert!(dispatcher.dispatch(event));
    assert!(!dispatcher.dispatch(event));
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}
