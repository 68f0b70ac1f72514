use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detect::Rect;
use crate::FaceError;

/// Selects one of the known face encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// OpenFace nn4.small2.v1: 96x96 input, 128-d output.
    #[default]
    OpenFace,
    /// FaceNet: 160x160 input, 128-d output.
    FaceNet,
    /// ArcFace: 112x112 input, 512-d output.
    ArcFace,
    /// Dlib ResNet: 150x150 input, 128-d output.
    Dlib,
    /// Caller-supplied [`ModelConfig`].
    Custom,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFace => write!(f, "openface"),
            Self::FaceNet => write!(f, "facenet"),
            Self::ArcFace => write!(f, "arcface"),
            Self::Dlib => write!(f, "dlib"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// Describes the input contract of a face encoder.
///
/// Only `feature_dim` matters to the registry; the remaining fields are
/// passed through to the [`FaceEncoder`] so it can prepare its input blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub kind: ModelKind,

    /// Width of the network input in pixels.
    pub input_width: u32,

    /// Height of the network input in pixels.
    pub input_height: u32,

    /// Length of the produced embedding.
    pub feature_dim: usize,

    /// Per-channel mean subtracted before scaling.
    #[serde(default)]
    pub mean: [f64; 4],

    /// Multiplier applied to pixel values after mean subtraction.
    pub scale_factor: f64,

    /// Swap red and blue channels.
    #[serde(default)]
    pub swap_rb: bool,

    /// Center-crop instead of stretching to the input size.
    #[serde(default)]
    pub crop: bool,
}

impl ModelConfig {
    /// Returns the predefined configuration for `kind`, or `None` for
    /// [`ModelKind::Custom`].
    pub fn preset(kind: ModelKind) -> Option<Self> {
        let cfg = match kind {
            ModelKind::OpenFace => Self::square(kind, 96, 128, 0.0, 1.0 / 255.0),
            ModelKind::FaceNet => Self::square(kind, 160, 128, 0.0, 1.0 / 127.5),
            ModelKind::ArcFace => Self::square(kind, 112, 512, 127.5, 1.0 / 127.5),
            ModelKind::Dlib => Self::square(kind, 150, 128, 0.0, 1.0 / 255.0),
            ModelKind::Custom => return None,
        };
        Some(cfg)
    }

    fn square(
        kind: ModelKind,
        size: u32,
        feature_dim: usize,
        mean: f64,
        scale_factor: f64,
    ) -> Self {
        Self {
            kind,
            input_width: size,
            input_height: size,
            feature_dim,
            mean: [mean, mean, mean, 0.0],
            scale_factor,
            swap_rb: true,
            crop: false,
        }
    }

    /// Checks that the configuration describes a usable encoder.
    pub fn validate(&self) -> Result<(), FaceError> {
        if self.feature_dim == 0 {
            return Err(FaceError::InvalidConfiguration(
                "model feature_dim must be positive".into(),
            ));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return Err(FaceError::InvalidConfiguration(format!(
                "model input size must be positive, got {}x{}",
                self.input_width, self.input_height
            )));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(FaceError::InvalidConfiguration(format!(
                "model scale_factor must be positive, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::square(ModelKind::OpenFace, 96, 128, 0.0, 1.0 / 255.0)
    }
}

/// Produces face embeddings from an image region.
///
/// The encoder owns all image handling: it crops `region` out of `image`,
/// resizes and normalizes it according to `model`, runs inference, and
/// returns the raw (not yet L2-normalized) embedding of length
/// `model.feature_dim`.
///
/// Implementations must be safe for concurrent use and are expected to
/// enforce their own timeouts, reporting them as errors.
pub trait FaceEncoder<I: ?Sized>: Send + Sync {
    fn encode(&self, image: &I, region: &Rect, model: &ModelConfig) -> Result<Vec<f32>, FaceError>;
}
