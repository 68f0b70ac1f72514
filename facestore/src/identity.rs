use std::fmt;

use serde::{Deserialize, Serialize};

/// An enrolled identity as it is persisted.
///
/// This is the durable record shape shared by every backend:
///
/// ```json
/// { "id": "alice", "displayName": "Alice", "samples": [[0.1, 0.2], [0.3, 0.4]] }
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique, immutable identifier.
    pub id: String,

    /// Free-form label. May be empty.
    #[serde(rename = "displayName", default)]
    pub display_name: String,

    /// Enrolled embeddings in insertion order.
    #[serde(default)]
    pub samples: Vec<Vec<f32>>,
}

impl Identity {
    /// Creates an identity with no samples.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            samples: Vec::new(),
        }
    }

    /// Creates an identity with the given samples.
    pub fn with_samples(
        id: impl Into<String>,
        display_name: impl Into<String>,
        samples: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            samples,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("samples", &self.samples.len())
            .finish()
    }
}
