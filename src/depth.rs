//! Depth frame reduction
//!
//! Reduces each depth frame to the nearest valid reading inside a small
//! focus region. Runs on the depth sensor's own thread, so the scan touches
//! only the region's pixels.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One depth map from the sensor, distances in meters
#[derive(Debug, Clone)]
pub struct DepthFrame {
    width: usize,
    height: usize,
    row_stride: usize,
    distances: Vec<f32>,
    captured_at: Instant,
}

impl DepthFrame {
    /// Build a frame from a row-major distance buffer
    ///
    /// `row_stride` is the number of samples between the starts of two rows and
    /// may exceed `width` when the sensor pads rows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if the geometry does not fit the buffer
    pub fn new(
        width: usize,
        height: usize,
        row_stride: usize,
        distances: Vec<f32>,
        captured_at: Instant,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidFrame(format!(
                "empty frame {width}x{height}"
            )));
        }
        if row_stride < width {
            return Err(Error::InvalidFrame(format!(
                "row stride {row_stride} shorter than width {width}"
            )));
        }
        let required = row_stride
            .checked_mul(height - 1)
            .and_then(|n| n.checked_add(width))
            .ok_or_else(|| {
                Error::InvalidFrame(format!(
                    "geometry {width}x{height} with stride {row_stride} overflows"
                ))
            })?;
        if distances.len() < required {
            return Err(Error::InvalidFrame(format!(
                "buffer holds {} samples, {required} required",
                distances.len()
            )));
        }

        Ok(Self {
            width,
            height,
            row_stride,
            distances,
            captured_at,
        })
    }

    /// Frame width in pixels
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// When the sensor captured this frame
    #[must_use]
    pub const fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Sub-rectangle of the frame scanned for obstacles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusRegion {
    /// Horizontal center as a fraction of the width
    pub center_x: f32,
    /// Vertical center as a fraction of the height
    pub center_y: f32,
    /// Half-size of the square region in pixels
    pub radius: usize,
}

impl Default for FocusRegion {
    fn default() -> Self {
        Self {
            center_x: 0.25,
            center_y: 0.5,
            radius: 20,
        }
    }
}

impl FocusRegion {
    /// Inclusive pixel bounds `(x0, x1, y0, y1)` clipped to the frame
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn bounds(&self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let cx = ((width as f32 * self.center_x.clamp(0.0, 1.0)) as usize).min(width - 1);
        let cy = ((height as f32 * self.center_y.clamp(0.0, 1.0)) as usize).min(height - 1);

        (
            cx.saturating_sub(self.radius),
            cx.saturating_add(self.radius).min(width - 1),
            cy.saturating_sub(self.radius),
            cy.saturating_add(self.radius).min(height - 1),
        )
    }
}

/// Nearest valid reading from one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    distance: f32,
    sampled_at: Instant,
}

impl DistanceSample {
    /// A sample with no valid reading
    #[must_use]
    pub const fn invalid(sampled_at: Instant) -> Self {
        Self {
            distance: f32::INFINITY,
            sampled_at,
        }
    }

    /// A sample at `distance` meters; non-positive or non-finite input is invalid
    #[must_use]
    pub fn at(distance: f32, sampled_at: Instant) -> Self {
        if distance > 0.0 && distance.is_finite() {
            Self {
                distance,
                sampled_at,
            }
        } else {
            Self::invalid(sampled_at)
        }
    }

    /// Distance in meters, `None` when there was no valid reading
    #[must_use]
    pub fn meters(&self) -> Option<f32> {
        self.is_valid().then_some(self.distance)
    }

    /// Whether the frame had at least one valid reading in the region
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.distance.is_finite()
    }

    /// Capture time of the frame the sample came from
    #[must_use]
    pub const fn sampled_at(&self) -> Instant {
        self.sampled_at
    }
}

/// Reduces depth frames to distance samples
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFrameProcessor {
    region: FocusRegion,
}

impl DepthFrameProcessor {
    /// Create a processor scanning `region`
    #[must_use]
    pub const fn new(region: FocusRegion) -> Self {
        Self { region }
    }

    /// The configured focus region
    #[must_use]
    pub const fn region(&self) -> FocusRegion {
        self.region
    }

    /// Reduce a frame to the minimum strictly-positive distance in the region
    ///
    /// Zero, negative and NaN readings are ignored. The frame is consumed.
    #[must_use]
    pub fn reduce(&self, frame: DepthFrame) -> DistanceSample {
        let (x0, x1, y0, y1) = self.region.bounds(frame.width, frame.height);

        let mut nearest = f32::INFINITY;
        for y in y0..=y1 {
            let row = &frame.distances[y * frame.row_stride..];
            for &distance in &row[x0..=x1] {
                if distance > 0.0 && distance < nearest {
                    nearest = distance;
                }
            }
        }

        DistanceSample::at(nearest, frame.captured_at)
    }
}
