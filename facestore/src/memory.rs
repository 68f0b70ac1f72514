//! In-memory identity store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::{Identity, IdentityStore, StoreError, StoreResult};

/// A volatile store backed by a map. Data is lost on restart.
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Identity>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for MemoryStore {
    fn save(&self, identity: &Identity) -> StoreResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        data.insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<Identity> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        data.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn load_all(&self) -> StoreResult<Vec<Identity>> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(data.values().cloned().collect())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        data.remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(data.contains_key(id))
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
