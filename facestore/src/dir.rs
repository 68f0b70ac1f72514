//! One-file-per-identity store.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::{Identity, IdentityStore, StoreError, StoreResult};

const EXT: &str = "json";

/// Persists each identity as `<base_dir>/<id>.json`.
///
/// Records are written to a temporary sibling and renamed into place, so a
/// crash mid-write never leaves a truncated record behind. [`DirStore::load_all`]
/// skips unreadable or malformed files instead of failing the whole scan.
///
/// [`DirStore::load_all`]: IdentityStore::load_all
pub struct DirStore {
    base_dir: PathBuf,
    lock: RwLock<()>,
}

impl DirStore {
    /// Opens a store rooted at `base_dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> StoreResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            lock: RwLock::new(()),
        })
    }

    /// Returns the directory this store writes to.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, id: &str) -> StoreResult<PathBuf> {
        validate_id(id)?;
        Ok(self.base_dir.join(format!("{id}.{EXT}")))
    }
}

/// Rejects ids that cannot be used verbatim as a file stem inside the base
/// directory.
fn validate_id(id: &str) -> StoreResult<()> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn read_record(path: &Path, id: &str) -> StoreResult<Identity> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    let identity: Identity = serde_json::from_slice(&data)?;
    if identity.id != id {
        return Err(StoreError::Serialization(format!(
            "record id {:?} does not match file name {:?}",
            identity.id, id
        )));
    }
    Ok(identity)
}

impl IdentityStore for DirStore {
    fn save(&self, identity: &Identity) -> StoreResult<()> {
        let path = self.record_path(&identity.id)?;
        let data = serde_json::to_vec_pretty(identity)?;

        let _guard = self
            .lock
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<Identity> {
        let path = self.record_path(id)?;
        let _guard = self
            .lock
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        read_record(&path, id)
    }

    fn load_all(&self) -> StoreResult<Vec<Identity>> {
        let _guard = self
            .lock
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        let mut identities = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match read_record(&path, id) {
                Ok(identity) => identities.push(identity),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "facestore: skipping unreadable record"
                    );
                }
            }
        }
        identities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(identities)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.record_path(id)?;
        let _guard = self
            .lock
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        let path = self.record_path(id)?;
        let _guard = self
            .lock
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(path.try_exists()?)
    }

    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dir_save_and_load() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();

        let alice = Identity::with_samples("a", "Alice", vec![vec![0.25, -0.5], vec![1.0, 0.0]]);
        store.save(&alice).unwrap();

        assert!(dir.path().join("a.json").is_file());
        assert_eq!(store.load("a").unwrap(), alice);
        assert!(store.exists("a").unwrap());
        assert!(!store.exists("b").unwrap());
    }

    #[test]
    fn test_dir_creates_base_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("x").join("y");
        let store = DirStore::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.base_dir(), nested.as_path());
    }

    #[test]
    fn test_dir_missing() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("nope"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_dir_delete() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.save(&Identity::new("a", "")).unwrap();
        store.delete("a").unwrap();
        assert!(!store.exists("a").unwrap());
        assert!(!dir.path().join("a.json").exists());
    }

    #[test]
    fn test_dir_rejects_path_ids() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        for id in ["", "../escape", "a/b", ".hidden", "a\\b"] {
            assert!(
                matches!(store.save(&Identity::new(id, "")), Err(StoreError::InvalidId(_))),
                "id {id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_dir_load_all_skips_corrupt() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        store.save(&Identity::with_samples("A", "Alice", vec![vec![1.0]])).unwrap();
        store.save(&Identity::with_samples("B", "Bob", vec![vec![2.0]])).unwrap();
        fs::write(dir.path().join("C.json"), b"{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        let all = store.load_all().unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(matches!(store.load("C"), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_dir_skips_mismatched_record_id() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        let other = serde_json::to_vec(&Identity::new("other", "")).unwrap();
        fs::write(dir.path().join("renamed.json"), other).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_dir_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DirStore::open(dir.path()).unwrap();
            store.save(&Identity::with_samples("a", "Alice", vec![vec![0.1, 0.2]])).unwrap();
            store.close().unwrap();
        }
        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.load("a").unwrap().samples, vec![vec![0.1, 0.2]]);
    }
}
