//! Haptic actuation on its own task

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::HapticEvent;
use crate::Result;

/// Device that produces one short haptic pulse
pub trait HapticActuator: Send + 'static {
    /// Trigger a single pulse
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the pulse
    fn fire_pulse(&mut self) -> Result<()>;

    /// Actuator name for logging
    fn name(&self) -> &'static str;
}

/// Actuator that records pulses in the log
///
/// Used when no haptic hardware is attached (headless hosts, replays).
#[derive(Debug, Default)]
pub struct LogActuator {
    pulses: u64,
}

impl HapticActuator for LogActuator {
    fn fire_pulse(&mut self) -> Result<()> {
        self.pulses += 1;
        tracing::info!(pulses = self.pulses, "haptic pulse");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Non-blocking handle used by the depth thread to hand off pulses
#[derive(Debug, Clone)]
pub struct HapticDispatcher {
    tx: mpsc::Sender<HapticEvent>,
}

impl HapticDispatcher {
    /// Wrap a channel sender
    #[must_use]
    pub const fn new(tx: mpsc::Sender<HapticEvent>) -> Self {
        Self { tx }
    }

    /// Queue a pulse without blocking
    ///
    /// Returns false if the pulse was discarded because the actuator is
    /// backed up or gone.
    pub fn dispatch(&self, event: HapticEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("actuator busy, pulse discarded");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("actuator task stopped, pulse discarded");
                false
            }
        }
    }
}

/// Spawn the actuator task
///
/// Returns the dispatcher for the depth thread and the task handle. The task
/// exits when every dispatcher is dropped.
pub fn spawn_actuator<A: HapticActuator>(
    mut actuator: A,
    capacity: usize,
) -> (HapticDispatcher, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<HapticEvent>(capacity.max(1));

    let handle = tokio::spawn(async move {
        tracing::debug!(actuator = actuator.name(), "haptic actuator started");
        while let Some(event) = rx.recv().await {
            if let Err(e) = actuator.fire_pulse() {
                tracing::warn!(
                    actuator = actuator.name(),
                    error = %e,
                    interval_ms = event.interval.as_millis(),
                    "haptic pulse failed"
                );
            }
        }
        tracing::debug!(actuator = actuator.name(), "haptic actuator stopped");
    });

    (HapticDispatcher::new(tx), handle)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;

    struct CountingActuator(Arc<AtomicUsize>);

    impl HapticActuator for CountingActuator {
        fn fire_pulse(&mut self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn event() -> HapticEvent {
        HapticEvent {
            fired_at: Instant::now(),
            interval: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_dispatched_pulses_reach_actuator() {
        let count = Arc::new(AtomicUsize::new(0));
        let (dispatcher, handle) = spawn_actuator(CountingActuator(Arc::clone(&count)), 8);

        assert!(dispatcher.dispatch(event()));
        assert!(dispatcher.dispatch(event()));
        drop(dispatcher);

        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_full_channel_discards_instead_of_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let dispatcher = HapticDispatcher::new(tx);

        assert!(dispatcher.dispatch(event()));
        assert!(!dispatcher.dispatch(event()));
    }

    #[test]
    fn test_closed_channel_discards() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dispatcher = HapticDispatcher::new(tx);

        assert!(!dispatcher.dispatch(event()));
    }
}
