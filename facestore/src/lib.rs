//! Identity storage interface and implementations.
//!
//! Provides the [`IdentityStore`] trait with three interchangeable backends:
//!
//! - [`MemoryStore`]: volatile, lives as long as the process
//! - [`DirStore`]: one JSON file per identity under a base directory
//! - [`JsonFileStore`]: every identity in a single JSON file
//!
//! All backends share the same record shape ([`Identity`]), so files written
//! by [`DirStore`] can be merged into a [`JsonFileStore`] file and back.

mod dir;
mod error;
mod identity;
mod json;
mod memory;

use std::fmt;

pub use dir::DirStore;
pub use error::{StoreError, StoreResult};
pub use identity::Identity;
pub use json::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Durable (or volatile) storage of identity records.
///
/// Every method takes or returns independent copies: a backend never holds
/// references into caller-owned data, and callers can never mutate a
/// backend's state through a returned value.
///
/// Implementations must be safe for concurrent use.
pub trait IdentityStore: Send + Sync {
    /// Create or replace the record keyed by `identity.id`.
    fn save(&self, identity: &Identity) -> StoreResult<()>;

    /// Load one record. Fails with [`StoreError::NotFound`] if absent.
    fn load(&self, id: &str) -> StoreResult<Identity>;

    /// Load every record, sorted by id.
    fn load_all(&self) -> StoreResult<Vec<Identity>>;

    /// Delete one record. Fails with [`StoreError::NotFound`] if absent.
    fn delete(&self, id: &str) -> StoreResult<()>;

    /// Report whether a record with this id exists.
    fn exists(&self, id: &str) -> StoreResult<bool>;

    /// Flush pending state and release resources.
    fn close(&self) -> StoreResult<()>;
}

impl fmt::Debug for dyn IdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityStore {{ ... }}")
    }
}

/// A boxed store for use in trait objects.
pub type BoxedIdentityStore = Box<dyn IdentityStore>;

/// Summary of what a store currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct StorageMetadata {
    pub total_identities: usize,
    pub total_samples: usize,
    pub last_updated: DateTime<Utc>,
}

/// Computes [`StorageMetadata`] by loading every record from `store`.
pub fn storage_metadata(store: &dyn IdentityStore) -> StoreResult<StorageMetadata> {
    let identities = store.load_all()?;
    let total_samples = identities.iter().map(|p| p.samples.len()).sum();
    Ok(StorageMetadata {
        total_identities: identities.len(),
        total_samples,
        last_updated: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_counts_identities_and_samples() {
        let store = MemoryStore::new();
        store
            .save(&Identity::with_samples("a", "Alice", vec![vec![1.0, 0.0], vec![0.0, 1.0]]))
            .unwrap();
        store
            .save(&Identity::with_samples("b", "Bob", vec![vec![1.0, 1.0]]))
            .unwrap();
        store.save(&Identity::new("c", "")).unwrap();

        let meta = storage_metadata(&store).unwrap();
        assert_eq!(meta.total_identities, 3);
        assert_eq!(meta.total_samples, 3);
    }

    #[test]
    fn metadata_empty_store() {
        let meta = storage_metadata(&MemoryStore::new()).unwrap();
        assert_eq!(meta.total_identities, 0);
        assert_eq!(meta.total_samples, 0);
    }
}
