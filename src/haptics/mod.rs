//! Distance-adaptive haptic alerts
//!
//! The closer the obstacle, the shorter the allowed gap between pulses.
//! Scheduling happens synchronously on the depth thread; pulses are handed to
//! the actuator task through a channel.

mod actuator;
mod monitor;

pub use actuator::{HapticActuator, HapticDispatcher, LogActuator, spawn_actuator};
pub use monitor::{DepthFeed, ObstacleMonitor};

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::depth::DistanceSample;
use crate::{Error, Result};

/// Mapping from obstacle distance to pulse interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticPolicy {
    /// At or below this distance (meters) pulses use `min_interval`
    pub near_threshold: f32,
    /// At or above this distance (meters) pulses use `max_interval`
    pub far_threshold: f32,
    /// Shortest gap between pulses
    #[serde(with = "crate::timer::secs_f64")]
    pub min_interval: Duration,
    /// Longest gap between pulses
    #[serde(with = "crate::timer::secs_f64")]
    pub max_interval: Duration,
}

impl Default for HapticPolicy {
    fn default() -> Self {
        Self {
            near_threshold: 0.3,
            far_threshold: 10.0,
            min_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(3),
        }
    }
}

impl HapticPolicy {
    /// Check thresholds and intervals are ordered
    ///
    /// # Errors
    ///
    /// Returns `Config` if `near >= far` or `min_interval > max_interval`
    pub fn validate(&self) -> Result<()> {
        if !(self.near_threshold > 0.0 && self.near_threshold < self.far_threshold) {
            return Err(Error::Config(format!(
                "haptics: near threshold {} must be positive and below far threshold {}",
                self.near_threshold, self.far_threshold
            )));
        }
        if self.min_interval > self.max_interval {
            return Err(Error::Config(format!(
                "haptics: min interval {:?} exceeds max interval {:?}",
                self.min_interval, self.max_interval
            )));
        }
        Ok(())
    }

    /// Pulse interval for an obstacle at `distance` meters
    ///
    /// Linear between the thresholds, clamped outside them.
    #[must_use]
    pub fn interval_for(&self, distance: f32) -> Duration {
        if distance <= self.near_threshold {
            return self.min_interval;
        }
        if distance >= self.far_threshold {
            return self.max_interval;
        }

        let ratio = f64::from(distance - self.near_threshold)
            / f64::from(self.far_threshold - self.near_threshold);
        let min = self.min_interval.as_secs_f64();
        let max = self.max_interval.as_secs_f64();

        Duration::from_secs_f64(min + ratio * (max - min))
    }
}

/// One approved actuator pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticEvent {
    /// When the pulse was approved
    pub fired_at: Instant,
    /// Interval that gated this pulse
    pub interval: Duration,
}

/// Distance-adaptive rate limiter for haptic pulses
#[derive(Debug, Clone)]
pub struct HapticAlertScheduler {
    policy: HapticPolicy,
    last_fired: Option<HapticEvent>,
}

impl HapticAlertScheduler {
    /// Create a scheduler that has never fired
    #[must_use]
    pub const fn new(policy: HapticPolicy) -> Self {
        Self {
            policy,
            last_fired: None,
        }
    }

    /// The policy in use
    #[must_use]
    pub const fn policy(&self) -> &HapticPolicy {
        &self.policy
    }

    /// Decide whether `sample` warrants a pulse at `now`
    ///
    /// A pulse needs the current sample's interval to have elapsed since the
    /// last pulse, so a suddenly closer obstacle is felt at once. Invalid
    /// samples never fire and leave the last-fired time untouched.
    pub fn on_sample(&mut self, sample: &DistanceSample, now: Instant) -> Option<HapticEvent> {
        let distance = sample.meters()?;
        let interval = self.policy.interval_for(distance);

        if let Some(last) = self.last_fired
            && now.saturating_duration_since(last.fired_at) < interval
        {
            return None;
        }

        let event = HapticEvent {
            fired_at: now,
            interval,
        };
        self.last_fired = Some(event);
        tracing::trace!(distance, ?interval, "haptic pulse approved");
        Some(event)
    }
}
