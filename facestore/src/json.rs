//! Single-file JSON store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::{Identity, IdentityStore, StoreError, StoreResult};

/// Keeps every identity in one JSON object keyed by id.
///
/// The whole file is rewritten on every [`save`](IdentityStore::save) and
/// [`delete`](IdentityStore::delete), so this backend is meant for small
/// registries. A failed rewrite rolls the in-memory copy back so the store
/// keeps reflecting what is on disk.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, Identity>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, loading existing records if the file exists.
    /// A malformed existing file is an error; entries whose key differs from
    /// the record id are dropped.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.try_exists()? {
            let raw = fs::read(&path)?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                BTreeMap::new()
            } else {
                let mut data: BTreeMap<String, Identity> = serde_json::from_slice(&raw)?;
                data.retain(|key, identity| {
                    if *key == identity.id {
                        return true;
                    }
                    tracing::warn!(
                        key = %key,
                        id = %identity.id,
                        "facestore: skipping record stored under another id"
                    );
                    false
                });
                data
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Returns the file this store writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, data: &BTreeMap<String, Identity>) -> StoreResult<()> {
        let encoded = serde_json::to_vec_pretty(data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&encoded)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl IdentityStore for JsonFileStore {
    fn save(&self, identity: &Identity) -> StoreResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let previous = data.insert(identity.id.clone(), identity.clone());
        if let Err(e) = self.write_file(&data) {
            match previous {
                Some(p) => data.insert(identity.id.clone(), p),
                None => data.remove(&identity.id),
            };
            return Err(e);
        }
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
        let Some(previous) = data.remove(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        if let Err(e) = self.write_file(&data) {
            data.insert(id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(data.contains_key(id))
    }

    fn close(&self) -> StoreResult<()> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        self.write_file(&data)
    }
}
