//! Depth-to-haptics loop on a dedicated thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{HapticAlertScheduler, HapticDispatcher, HapticEvent, HapticPolicy};
use crate::depth::{DepthFrame, DepthFrameProcessor, FocusRegion};

/// Sensor-side handle for pushing depth frames
///
/// `push` never blocks: if the monitor thread is still busy with the previous
/// frame, the new one is dropped.
#[derive(Debug, Clone)]
pub struct DepthFeed {
    tx: mpsc::Sender<DepthFrame>,
    enabled: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl DepthFeed {
    /// Push one frame. Returns false if it was not accepted.
    pub fn push(&self, frame: DepthFrame) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop accepting frames (sensor reported unavailable)
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Whether frames are still accepted
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Frames dropped because the monitor was busy
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Reduces frames, schedules pulses and dispatches them
pub struct ObstacleMonitor {
    processor: DepthFrameProcessor,
    scheduler: HapticAlertScheduler,
    dispatcher: HapticDispatcher,
}

impl ObstacleMonitor {
    /// Create a monitor
    #[must_use]
    pub const fn new(
        region: FocusRegion,
        policy: HapticPolicy,
        dispatcher: HapticDispatcher,
    ) -> Self {
        Self {
            processor: DepthFrameProcessor::new(region),
            scheduler: HapticAlertScheduler::new(policy),
            dispatcher,
        }
    }

    /// Process one frame at `now`, dispatching a pulse if one is due
    pub fn handle_frame(&mut self, frame: DepthFrame, now: Instant) -> Option<HapticEvent> {
        let sample = self.processor.reduce(frame);
        let event = self.scheduler.on_sample(&sample, now)?;
        self.dispatcher.dispatch(event);
        Some(event)
    }

    /// Run the monitor on its own OS thread
    ///
    /// Returns the feed for the sensor side. The thread exits once every feed
    /// clone is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn(
        mut self,
        capacity: usize,
    ) -> std::io::Result<(DepthFeed, std::thread::JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::channel::<DepthFrame>(capacity.max(1));

        let handle = std::thread::Builder::new()
            .name("depth-monitor".to_string())
            .spawn(move || {
                tracing::debug!(region = ?self.processor.region(), "depth monitor started");
                while let Some(frame) = rx.blocking_recv() {
                    self.handle_frame(frame, Instant::now());
                }
                tracing::debug!("depth monitor stopped");
            })?;

        let feed = DepthFeed {
            tx,
            enabled: Arc::new(AtomicBool::new(true)),
            dropped: Arc::new(AtomicU64::new(0)),
        };

        Ok((feed, handle))
    }
}
