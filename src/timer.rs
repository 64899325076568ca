//! Cancellable timers owned by a single subsystem
//!
//! A [`CancellableTimer`] is polled from its owner's `select!` loop, so a
//! firing is always serialized with the owner's other inputs. Cancelling or
//! re-arming replaces the schedule; nothing outlives the owner.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Schedule {
    deadline: Instant,
    period: Option<Duration>,
}

/// One-shot or repeating timer with explicit start/cancel
#[derive(Debug)]
pub struct CancellableTimer {
    name: &'static str,
    schedule: Option<Schedule>,
}

impl CancellableTimer {
    /// Create a disarmed timer; `name` is used in logs
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            schedule: None,
        }
    }

    /// Arm a repeating timer whose first firing is one `period` from now
    ///
    /// Replaces any existing schedule, so the timer is never double-armed.
    pub fn start_repeating(&mut self, period: Duration) {
        self.schedule = Some(Schedule {
            deadline: Instant::now() + period,
            period: Some(period),
        });
        tracing::trace!(timer = self.name, ?period, "repeating timer armed");
    }

    /// Arm a one-shot timer, replacing any existing schedule
    pub fn start_once(&mut self, delay: Duration) {
        self.schedule = Some(Schedule {
            deadline: Instant::now() + delay,
            period: None,
        });
        tracing::trace!(timer = self.name, ?delay, "one-shot timer armed");
    }

    /// Disarm the timer. Returns true if it was armed.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.schedule.take().is_some();
        if was_armed {
            tracing::trace!(timer = self.name, "timer cancelled");
        }
        was_armed
    }

    /// Whether the timer will fire
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.schedule.is_some()
    }

    /// Wait for the next firing
    ///
    /// Never completes while disarmed. Cancel-safe: dropping the future before
    /// the deadline leaves the schedule untouched.
    pub async fn fired(&mut self) {
        let Some(Schedule { deadline, period }) = self.schedule else {
            return std::future::pending().await;
        };

        tokio::time::sleep_until(deadline).await;

        self.schedule = period.map(|period| {
            let now = Instant::now();
            let next = deadline + period;
            Schedule {
                // Skip missed periods instead of bursting
                deadline: if next <= now { now + period } else { next },
                period: Some(period),
            }
        });
    }
}

/// Serde adapter storing durations as fractional seconds
pub mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    /// # Errors
    ///
    /// Rejects negative, non-finite or overflowing values
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
