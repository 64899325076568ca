//! Readable labels for the current position

use std::sync::Arc;
use std::time::Duration;

use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Coordinate, GeocodingService};
use crate::speech::{SpeechHandle, SpeechRequest, SpeechSource};

const UNKNOWN_LOCATION_MESSAGE: &str = "Your location is not known yet.";

/// Decimal places kept in cache keys (about 11 m of latitude)
const KEY_PRECISION: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerSettings {
    /// Movement needed before the label is looked up again
    pub min_movement_m: f64,
    /// How long a cached label stays valid
    #[serde(with = "crate::timer::secs_f64")]
    pub cache_ttl: Duration,
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            min_movement_m: 25.0,
            cache_ttl: Duration::from_secs(600),
        }
    }
}

/// Reverse-geocodes fixes into a label, throttled by movement and cached
pub struct LocationLabeler {
    geocoder: Arc<dyn GeocodingService>,
    settings: LabelerSettings,
    cache: Cache<(i64, i64), String>,
    last_lookup: Option<Coordinate>,
    label: watch::Sender<Option<String>>,
}

impl LocationLabeler {
    #[must_use]
    pub fn new(geocoder: Arc<dyn GeocodingService>, settings: LabelerSettings) -> Self {
        let (label, _) = watch::channel(None);
        Self {
            geocoder,
            settings,
            cache: Cache::builder()
                .max_capacity(512)
                .time_to_live(settings.cache_ttl)
                .build(),
            last_lookup: None,
            label,
        }
    }

    /// Read side of the published label
    #[must_use]
    pub fn labels(&self) -> LocationLabels {
        LocationLabels {
            rx: self.label.subscribe(),
        }
    }

    /// Update the label for `fix` if it moved far enough
    ///
    /// Returns the label when a lookup (cached or remote) happened. Lookup
    /// failures keep the previous label and are retried on the next fix.
    pub async fn on_fix(&mut self, fix: Coordinate) -> Option<String> {
        if let Some(previous) = self.last_lookup
            && previous.distance_to(&fix) <= self.settings.min_movement_m
        {
            return None;
        }

        let key = fix.rounded(KEY_PRECISION);
        let label = if let Some(label) = self.cache.get(&key) {
            label
        } else {
            match self.geocoder.reverse(fix).await {
                Ok(label) => {
                    self.cache.insert(key, label.clone());
                    label
                }
                Err(e) => {
                    tracing::debug!(%fix, error = %e, "reverse geocoding failed");
                    return None;
                }
            }
        };

        self.last_lookup = Some(fix);
        tracing::debug!(%fix, label = %label, "location label updated");
        self.label.send_replace(Some(label.clone()));
        Some(label)
    }

    /// Follow `fixes` until the sender is dropped
    pub fn spawn(mut self, mut fixes: watch::Receiver<Option<Coordinate>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while fixes.changed().await.is_ok() {
                let fix = *fixes.borrow_and_update();
                if let Some(fix) = fix {
                    self.on_fix(fix).await;
                }
            }
            tracing::debug!("location labeler stopped");
        })
    }
}

/// Latest location label
#[derive(Debug, Clone)]
pub struct LocationLabels {
    rx: watch::Receiver<Option<String>>,
}

impl LocationLabels {
    /// Labels that never change, for one-shot tools and tests
    #[must_use]
    pub fn fixed(label: Option<String>) -> Self {
        let (_, rx) = watch::channel(label);
        Self { rx }
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Speak the current label
    pub fn readback(&self, speech: &SpeechHandle) {
        let text = match self.current() {
            Some(label) => format!("You are near {label}."),
            None => UNKNOWN_LOCATION_MESSAGE.to_string(),
        };
        speech.speak(SpeechRequest::interrupting(SpeechSource::Readback, text));
    }
}
