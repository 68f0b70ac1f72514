use serde::{Deserialize, Serialize};

use crate::FaceError;

/// Axis-aligned rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A candidate face returned by a [`FaceDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub bbox: Rect,
    /// Detector confidence; higher is better. Scale is detector-specific.
    pub quality: f32,
}

/// Tuning knobs passed to the detector on every call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Smallest face edge in pixels.
    pub min_size: u32,
    /// Largest face edge in pixels.
    pub max_size: u32,
    /// Sliding window step as a fraction of the window size.
    pub shift_factor: f64,
    /// Growth factor between scan scales.
    pub scale_factor: f64,
    /// Regions scoring at or below this value are discarded by the detector.
    pub quality_threshold: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            min_size: 100,
            max_size: 1000,
            shift_factor: 0.1,
            scale_factor: 1.1,
            quality_threshold: 5.0,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), FaceError> {
        if self.min_size == 0 || self.min_size > self.max_size {
            return Err(FaceError::InvalidConfiguration(format!(
                "detector size range invalid: min {} max {}",
                self.min_size, self.max_size
            )));
        }
        if !(self.shift_factor > 0.0 && self.shift_factor <= 1.0) {
            return Err(FaceError::InvalidConfiguration(format!(
                "detector shift_factor must be in (0, 1], got {}",
                self.shift_factor
            )));
        }
        if !(self.scale_factor > 1.0 && self.scale_factor.is_finite()) {
            return Err(FaceError::InvalidConfiguration(format!(
                "detector scale_factor must be > 1, got {}",
                self.scale_factor
            )));
        }
        if !self.quality_threshold.is_finite() {
            return Err(FaceError::InvalidConfiguration(
                "detector quality_threshold must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Locates faces in an image.
///
/// Detection must be free of side effects and deterministic for a given
/// image and [`DetectorParams`]. Implementations are expected to enforce
/// their own timeouts and report them as [`FaceError::DetectionFailed`].
pub trait FaceDetector<I: ?Sized>: Send + Sync {
    fn detect(&self, image: &I, params: &DetectorParams) -> Result<Vec<FaceRegion>, FaceError>;
}

/// Picks the region to enroll from: highest quality, then larger area.
/// Among exact ties the earliest region wins.
pub fn best_region(regions: &[FaceRegion]) -> Option<&FaceRegion> {
    regions.iter().reduce(|best, r| {
        let better = match r.quality.total_cmp(&best.quality) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => r.bbox.area() > best.bbox.area(),
            std::cmp::Ordering::Less => false,
        };
        if better { r } else { best }
    })
}
