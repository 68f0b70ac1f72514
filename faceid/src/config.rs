//! Recognizer configuration.
//!
//! Loadable from YAML or JSON:
//!
//! ```yaml
//! model: arcface
//! threshold: 0.55
//! detector:
//!   min_size: 80
//! storage:
//!   type: dir
//!   path: /var/lib/faces
//! auto_persist: true
//! ```

use std::path::{Path, PathBuf};

use facekit_facestore::{DirStore, IdentityStore, JsonFileStore, MemoryStore};
use serde::{Deserialize, Serialize};

use crate::detect::DetectorParams;
use crate::model::{ModelConfig, ModelKind};
use crate::FaceError;

/// Default minimum cosine similarity for a match.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Where enrolled identities are kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Volatile, process lifetime only.
    #[default]
    Memory,
    /// One JSON file per identity under `path`.
    Dir { path: PathBuf },
    /// All identities in the single JSON file at `path`.
    JsonFile { path: PathBuf },
}

impl StorageConfig {
    /// Opens the configured backend.
    pub fn open(&self) -> Result<Box<dyn IdentityStore>, FaceError> {
        let store: Box<dyn IdentityStore> = match self {
            Self::Memory => Box::new(MemoryStore::new()),
            Self::Dir { path } => Box::new(DirStore::open(path)?),
            Self::JsonFile { path } => Box::new(JsonFileStore::open(path)?),
        };
        Ok(store)
    }

    /// Reports whether the backend survives a restart.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Everything needed to build a [`Recognizer`](crate::Recognizer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Predefined encoder, or `custom` to use `custom_model`.
    pub model: ModelKind,

    /// Encoder description used when `model` is `custom`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<ModelConfig>,

    /// Minimum cosine similarity in `[0, 1]` to accept a match.
    pub threshold: f32,

    pub detector: DetectorParams,

    pub storage: StorageConfig,

    /// Write identities through to storage on enroll, sample append and removal.
    pub auto_persist: bool,

    /// Load existing identities from a durable backend on construction.
    pub restore_on_start: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            custom_model: None,
            threshold: DEFAULT_THRESHOLD,
            detector: DetectorParams::default(),
            storage: StorageConfig::default(),
            auto_persist: false,
            restore_on_start: true,
        }
    }
}

impl RecognizerConfig {
    /// Parses a YAML (or JSON, which is valid YAML) document.
    pub fn from_yaml(s: &str) -> Result<Self, FaceError> {
        serde_yaml::from_str(s).map_err(|e| FaceError::InvalidConfiguration(e.to_string()))
    }

    /// Parses a JSON document.
    pub fn from_json(s: &str) -> Result<Self, FaceError> {
        serde_json::from_str(s).map_err(|e| FaceError::InvalidConfiguration(e.to_string()))
    }

    /// Reads a config file. `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FaceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FaceError::InvalidConfiguration(format!("read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Resolves the active model configuration.
    pub fn model_config(&self) -> Result<ModelConfig, FaceError> {
        let mut cfg = match (self.model, &self.custom_model) {
            (ModelKind::Custom, Some(custom)) => custom.clone(),
            (ModelKind::Custom, None) => {
                return Err(FaceError::InvalidConfiguration(
                    "model is custom but custom_model is missing".into(),
                ));
            }
            (kind, _) => ModelConfig::preset(kind).ok_or_else(|| {
                FaceError::InvalidConfiguration(format!("no preset for model {kind}"))
            })?,
        };
        if self.model == ModelKind::Custom {
            cfg.kind = ModelKind::Custom;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every field; returns the resolved model configuration.
    pub fn validate(&self) -> Result<ModelConfig, FaceError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(FaceError::InvalidConfiguration(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        self.detector.validate()?;
        self.model_config()
    }
}
