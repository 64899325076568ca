//! Permission and sensor availability
//!
//! A denied permission or a missing sensor turns its feature off for the rest
//! of the session. The user hears about it exactly once.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::speech::{SpeechHandle, SpeechRequest, SpeechSource};
use crate::vision::CAMERA_UNAVAILABLE_MESSAGE;
use crate::{Error, Result};

/// Something the user can lose access to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Location,
    Microphone,
    DepthSensor,
    Camera,
}

impl Feature {
    /// Message spoken when the feature is turned off
    #[must_use]
    pub const fn disabled_message(self) -> &'static str {
        match self {
            Self::Location => {
                "Please enable location permissions in the settings to use the navigation function."
            }
            Self::Microphone => "Please enable microphone permission in the settings.",
            Self::DepthSensor => "Obstacle sensing is unavailable. Haptic alerts are off.",
            Self::Camera => CAMERA_UNAVAILABLE_MESSAGE,
        }
    }

    const fn is_permission(self) -> bool {
        matches!(self, Self::Location | Self::Microphone)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Location => "location",
            Self::Microphone => "microphone",
            Self::DepthSensor => "depth sensor",
            Self::Camera => "camera",
        };
        f.write_str(name)
    }
}

/// Status reported by the platform for a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Authorized,
    Denied,
    Restricted,
    Unavailable,
}

/// Tracks which features are off
pub struct FeatureGate {
    disabled: Mutex<HashSet<Feature>>,
    speech: SpeechHandle,
}

impl FeatureGate {
    #[must_use]
    pub fn new(speech: SpeechHandle) -> Self {
        Self {
            disabled: Mutex::new(HashSet::new()),
            speech,
        }
    }

    /// Apply a status report
    ///
    /// Returns true if this report turned the feature off. Off is terminal:
    /// a later `Authorized` does not turn it back on.
    pub fn report(&self, feature: Feature, status: FeatureStatus) -> bool {
        if status == FeatureStatus::Authorized {
            return false;
        }

        let newly_disabled = self
            .disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(feature);

        if newly_disabled {
            tracing::warn!(%feature, ?status, "feature disabled");
            self.speech.speak(SpeechRequest::interrupting(
                SpeechSource::System,
                feature.disabled_message(),
            ));
        }
        newly_disabled
    }

    #[must_use]
    pub fn is_enabled(&self, feature: Feature) -> bool {
        !self
            .disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&feature)
    }

    /// # Errors
    ///
    /// Returns `PermissionDenied` or `SensorUnavailable` for a disabled feature
    pub fn check(&self, feature: Feature) -> Result<()> {
        if self.is_enabled(feature) {
            Ok(())
        } else if feature.is_permission() {
            Err(Error::PermissionDenied(feature.to_string()))
        } else {
            Err(Error::SensorUnavailable(feature.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_feature_reported_once() {
        let (speech, mut rx) = SpeechHandle::channel();
        let gate = FeatureGate::new(speech);

        assert!(gate.report(Feature::Location, FeatureStatus::Denied));
        assert!(!gate.report(Feature::Location, FeatureStatus::Restricted));
        assert!(gate.report(Feature::Camera, FeatureStatus::Unavailable));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.text, Feature::Location.disabled_message());
        assert!(first.interrupt);
        assert_eq!(rx.try_recv().unwrap().text, "The camera is not available.");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disabled_is_terminal() {
        let (speech, _rx) = SpeechHandle::channel();
        let gate = FeatureGate::new(speech);

        gate.report(Feature::Microphone, FeatureStatus::Denied);
        assert!(!gate.report(Feature::Microphone, FeatureStatus::Authorized));
        assert!(!gate.is_enabled(Feature::Microphone));
        assert!(matches!(
            gate.check(Feature::Microphone),
            Err(Error::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_authorized_keeps_feature_on() {
        let (speech, mut rx) = SpeechHandle::channel();
        let gate = FeatureGate::new(speech);

        assert!(!gate.report(Feature::DepthSensor, FeatureStatus::Authorized));
        assert!(gate.check(Feature::DepthSensor).is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sensor_check_error_kind() {
        let (speech, _rx) = SpeechHandle::channel();
        let gate = FeatureGate::new(speech);

        gate.report(Feature::DepthSensor, FeatureStatus::Unavailable);
        assert!(matches!(
            gate.check(Feature::DepthSensor),
            Err(Error::SensorUnavailable(_))
        ));
    }
}
