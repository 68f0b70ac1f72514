use facekit_facestore::{storage_metadata, IdentityStore, StorageMetadata};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::RecognizerConfig;
use crate::detect::{best_region, DetectorParams, FaceDetector, Rect};
use crate::embedding::normalize;
use crate::matcher::{LinearMatcher, MatchResult, Matcher};
use crate::model::{FaceEncoder, ModelConfig};
use crate::registry::Registry;
use crate::FaceError;

/// One recognized face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionResult {
    /// Where the face was found.
    pub bbox: Rect,
    /// Detector quality score for the region.
    pub quality: f32,
    /// Best identity, or unknown.
    pub identity: MatchResult,
}

/// A detected face that could not be encoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRegion {
    /// Position in the detector's output.
    pub index: usize,
    pub bbox: Rect,
    pub reason: String,
}

/// Output of [`Recognizer::recognize`].
///
/// Every detected region appears exactly once, either in `results` or in
/// `skipped`, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recognition {
    pub results: Vec<RecognitionResult>,
    pub skipped: Vec<SkippedRegion>,
}

/// End-to-end enrollment and recognition.
///
/// Wires an external [`FaceDetector`] and [`FaceEncoder`] to a
/// [`Registry`] and a [`Matcher`]. `I` is the caller's image type; the
/// recognizer never looks inside it.
///
/// Thread-safe: all methods can be called concurrently.
pub struct Recognizer<I: ?Sized> {
    detector: Box<dyn FaceDetector<I>>,
    encoder: Box<dyn FaceEncoder<I>>,
    matcher: Box<dyn Matcher>,
    registry: Registry,
    model: ModelConfig,
    params: DetectorParams,
    threshold: RwLock<f32>,
    auto_persist: bool,
    // Orders auto-persist writes against removals so a save never lands
    // after the delete of the same identity.
    persist_lock: Mutex<()>,
}

impl<I: ?Sized> Recognizer<I> {
    /// Builds a recognizer from `cfg`, opening its storage backend.
    ///
    /// With a durable backend and `restore_on_start`, previously stored
    /// identities are loaded before this returns.
    pub fn new(
        cfg: RecognizerConfig,
        detector: Box<dyn FaceDetector<I>>,
        encoder: Box<dyn FaceEncoder<I>>,
    ) -> Result<Self, FaceError> {
        cfg.validate()?;
        let store = cfg.storage.open()?;
        let restore = cfg.restore_on_start && cfg.storage.is_durable();
        Self::build(cfg, store, restore, detector, encoder)
    }

    /// Builds a recognizer on a caller-supplied store, ignoring
    /// `cfg.storage`.
    ///
    /// With `restore_on_start`, whatever `store` already holds is loaded
    /// before this returns.
    pub fn with_store(
        cfg: RecognizerConfig,
        store: Box<dyn IdentityStore>,
        detector: Box<dyn FaceDetector<I>>,
        encoder: Box<dyn FaceEncoder<I>>,
    ) -> Result<Self, FaceError> {
        let restore = cfg.restore_on_start;
        Self::build(cfg, store, restore, detector, encoder)
    }

    fn build(
        cfg: RecognizerConfig,
        store: Box<dyn IdentityStore>,
        restore: bool,
        detector: Box<dyn FaceDetector<I>>,
        encoder: Box<dyn FaceEncoder<I>>,
    ) -> Result<Self, FaceError> {
        let model = cfg.validate()?;
        let registry = Registry::new(model.feature_dim, store)?;
        if restore {
            registry.restore()?;
        }
        Ok(Self {
            detector,
            encoder,
            matcher: Box::new(LinearMatcher),
            registry,
            model,
            params: cfg.detector,
            threshold: RwLock::new(cfg.threshold),
            auto_persist: cfg.auto_persist,
            persist_lock: Mutex::new(()),
        })
    }

    /// Replaces the default [`LinearMatcher`].
    pub fn with_matcher(mut self, matcher: Box<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    pub fn detector_params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn threshold(&self) -> f32 {
        *self.threshold.read()
    }

    /// Adjusts matching strictness at runtime.
    pub fn set_threshold(&self, threshold: f32) -> Result<(), FaceError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FaceError::InvalidConfiguration(format!(
                "threshold must be in [0, 1], got {threshold}"
            )));
        }
        *self.threshold.write() = threshold;
        Ok(())
    }

    /// Registers a new identity with no samples.
    pub fn enroll_identity(&self, id: &str, display_name: &str) -> Result<(), FaceError> {
        self.registry.enroll(id, display_name)?;
        if self.auto_persist {
            self.persist(id)?;
        }
        Ok(())
    }

    /// Adds the best face found in `image` as a sample of `id`.
    ///
    /// The registry is only changed if detection, encoding and validation
    /// all succeed. A storage failure afterwards is returned but the
    /// in-memory sample is kept. Returns the new sample count.
    pub fn enroll_sample(&self, id: &str, image: &I) -> Result<usize, FaceError> {
        if !self.registry.contains(id) {
            return Err(FaceError::NotFound(id.to_string()));
        }

        let regions = self.detector.detect(image, &self.params)?;
        let region = best_region(&regions).ok_or(FaceError::NoFaceDetected)?;
        let raw = self.encoder.encode(image, &region.bbox, &self.model)?;
        let count = self.registry.append_sample(id, &normalize(&raw))?;
        tracing::debug!(id, samples = count, quality = region.quality, "faceid: enrolled sample");

        if self.auto_persist {
            self.persist(id)?;
        }
        Ok(count)
    }

    /// Identifies every face in `image`.
    ///
    /// All faces are matched against the same registry snapshot. A face
    /// whose encoding fails is reported in [`Recognition::skipped`] and the
    /// rest are still processed.
    pub fn recognize(&self, image: &I) -> Result<Recognition, FaceError> {
        let regions = self.detector.detect(image, &self.params)?;
        let mut out = Recognition::default();
        if regions.is_empty() {
            return Ok(out);
        }

        let snapshot = self.registry.snapshot();
        let threshold = self.threshold();

        for (index, region) in regions.iter().enumerate() {
            let raw = self
                .encoder
                .encode(image, &region.bbox, &self.model)
                .and_then(|raw| self.check_dimension(raw));
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        index,
                        bbox = ?region.bbox,
                        error = %e,
                        "faceid: skipping region"
                    );
                    out.skipped.push(SkippedRegion {
                        index,
                        bbox: region.bbox,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let identity = self.matcher.match_query(&normalize(&raw), &snapshot, threshold);
            tracing::debug!(
                index,
                id = %identity.identity_id,
                confidence = identity.confidence,
                matched = identity.matched,
                "faceid: matched region"
            );
            out.results.push(RecognitionResult {
                bbox: region.bbox,
                quality: region.quality,
                identity,
            });
        }
        Ok(out)
    }

    /// Removes `id` from the registry, and from storage when auto-persisting.
    pub fn remove_identity(&self, id: &str) -> Result<(), FaceError> {
        if !self.auto_persist {
            return self.registry.remove(id);
        }

        let _guard = self.persist_lock.lock();
        self.registry.remove(id)?;
        match self.registry.unpersist(id) {
            Ok(()) => Ok(()),
            Err(FaceError::NotFound(_)) => {
                tracing::debug!(id, "faceid: removed identity had no stored record");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Writes every identity to storage. Returns how many were written.
    pub fn save(&self) -> Result<usize, FaceError> {
        self.registry.persist_all()
    }

    /// Reloads the registry from storage. Returns how many were loaded.
    pub fn restore(&self) -> Result<usize, FaceError> {
        self.registry.restore()
    }

    /// Summarizes what the storage backend holds.
    pub fn storage_metadata(&self) -> Result<StorageMetadata, FaceError> {
        Ok(storage_metadata(self.registry.store())?)
    }

    /// Flushes and closes the storage backend.
    pub fn close(&self) -> Result<(), FaceError> {
        self.registry.close()
    }

    /// Saves `id` unless it was removed in the meantime.
    fn persist(&self, id: &str) -> Result<(), FaceError> {
        let _guard = self.persist_lock.lock();
        if !self.registry.contains(id) {
            tracing::debug!(id, "faceid: identity removed before persist, skipping");
            return Ok(());
        }
        self.registry.persist(id)
    }

    fn check_dimension(&self, raw: Vec<f32>) -> Result<Vec<f32>, FaceError> {
        if raw.len() != self.model.feature_dim {
            return Err(FaceError::DimensionMismatch {
                expected: self.model.feature_dim,
                got: raw.len(),
            });
        }
        Ok(raw)
    }
}
