//! Camera frames

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use base64::Engine;

use crate::{Error, Result};

/// One JPEG still from the camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    jpeg: Vec<u8>,
    captured_at: SystemTime,
}

impl CapturedFrame {
    /// Wrap JPEG bytes
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if the bytes are empty or not a JPEG
    pub fn from_jpeg(jpeg: Vec<u8>) -> Result<Self> {
        // SOI marker
        if jpeg.len() < 4 || jpeg[..2] != [0xFF, 0xD8] {
            return Err(Error::InvalidFrame(
                "camera frame is not a JPEG image".to_string(),
            ));
        }
        Ok(Self {
            jpeg,
            captured_at: SystemTime::now(),
        })
    }

    #[must_use]
    pub fn jpeg(&self) -> &[u8] {
        &self.jpeg
    }

    #[must_use]
    pub const fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    /// `data:image/jpeg;base64,...` form for the vision request
    #[must_use]
    pub fn data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.jpeg);
        format!("data:image/jpeg;base64,{encoded}")
    }
}

/// Provides the most recent camera frame
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Latest frame
    ///
    /// # Errors
    ///
    /// Returns `SensorUnavailable` if there is no frame to give
    async fn latest_frame(&self) -> Result<CapturedFrame>;
}

/// Holds the last frame pushed by the camera bridge
#[derive(Debug, Clone, Default)]
pub struct SharedFrameSlot {
    latest: Arc<Mutex<Option<CapturedFrame>>>,
}

impl SharedFrameSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame
    pub fn store(&self, frame: CapturedFrame) {
        let mut latest = self.latest.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *latest = Some(frame);
    }

    /// Forget the held frame (camera went away)
    pub fn clear(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *latest = None;
    }
}

#[async_trait]
impl FrameSource for SharedFrameSlot {
    async fn latest_frame(&self) -> Result<CapturedFrame> {
        self.latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::SensorUnavailable("no camera frame received".to_string()))
    }
}

/// Reads a JPEG from disk on every capture
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn latest_frame(&self) -> Result<CapturedFrame> {
        let jpeg = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::SensorUnavailable(format!("cannot read {}: {e}", self.path.display()))
        })?;
        CapturedFrame::from_jpeg(jpeg)
    }
}
