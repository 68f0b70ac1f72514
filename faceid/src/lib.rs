//! Face identity registry and nearest-neighbor matching.
//!
//! # Architecture
//!
//! ```text
//! image -> FaceDetector -> regions -> FaceEncoder -> raw embedding
//!       -> normalize -> Registry::append_sample   (enroll)
//!                    -> Matcher::match_query      (recognize)
//! ```
//!
//! Detection and encoding are supplied by the caller through the
//! [`FaceDetector`] and [`FaceEncoder`] traits. This crate owns the
//! [`Registry`] of enrolled identities, the cosine [`Matcher`], and the
//! [`Recognizer`] that ties them together. Durability is delegated to any
//! [`IdentityStore`](facekit_facestore::IdentityStore).
//!
//! # Usage
//!
//! ```
//! use facekit_faceid::Registry;
//!
//! let reg = Registry::with_memory_store(3).unwrap();
//! reg.enroll("alice", "Alice").unwrap();
//! reg.append_sample("alice", &[1.0, 0.0, 0.0]).unwrap();
//!
//! let m = reg.best_match(&[0.9, 0.1, 0.0], 0.6);
//! assert_eq!(m.identity_id, "alice");
//! ```

mod config;
mod detect;
pub mod embedding;
mod error;
mod matcher;
mod model;
mod recognizer;
mod registry;

pub use config::{RecognizerConfig, StorageConfig, DEFAULT_THRESHOLD};
pub use detect::{best_region, DetectorParams, FaceDetector, FaceRegion, Rect};
pub use embedding::{distance, normalize, similarity};
pub use error::FaceError;
pub use facekit_facestore::{Identity, IdentityStore, StorageMetadata};
pub use matcher::{Candidate, LinearMatcher, MatchResult, Matcher, UNKNOWN_ID, UNKNOWN_NAME};
pub use model::{FaceEncoder, ModelConfig, ModelKind};
pub use recognizer::{Recognition, RecognitionResult, Recognizer, SkippedRegion};
pub use registry::{Registry, Snapshot, SnapshotIdentity};
