use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use facekit_facestore::{Identity, IdentityStore, MemoryStore};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::matcher::{LinearMatcher, MatchResult, Matcher};
use crate::FaceError;

struct Entry {
    display_name: String,
    samples: Vec<Arc<[f32]>>,
}

impl Entry {
    fn to_identity(&self, id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            display_name: self.display_name.clone(),
            samples: self.samples.iter().map(|s| s.to_vec()).collect(),
        }
    }
}

/// One identity inside a [`Snapshot`].
///
/// Samples are shared with the registry but immutable, so holding a
/// snapshot never lets a caller change registry state.
#[derive(Clone)]
pub struct SnapshotIdentity {
    pub id: String,
    pub display_name: String,
    pub samples: Vec<Arc<[f32]>>,
}

impl fmt::Debug for SnapshotIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotIdentity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// A point-in-time view of every identity, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    identities: Vec<SnapshotIdentity>,
}

impl Snapshot {
    /// Builds a snapshot from plain records. Records are sorted by id.
    pub fn from_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let mut identities: Vec<SnapshotIdentity> = identities
            .into_iter()
            .map(|p| SnapshotIdentity {
                id: p.id,
                display_name: p.display_name,
                samples: p.samples.into_iter().map(Arc::from).collect(),
            })
            .collect();
        identities.sort_by(|a, b| a.id.cmp(&b.id));
        Self { identities }
    }

    pub fn identities(&self) -> &[SnapshotIdentity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Total number of samples across all identities.
    pub fn sample_count(&self) -> usize {
        self.identities.iter().map(|p| p.samples.len()).sum()
    }
}

/// Holds enrolled identities and their face embeddings.
///
/// Thread-safe: all methods can be called concurrently.
///
/// # Locking
///
/// Two levels of [`RwLock`]:
///
/// - the outer lock guards the key set. [`enroll`](Self::enroll),
///   [`remove`](Self::remove) and [`restore`](Self::restore) take it
///   exclusively; everything else takes it shared.
/// - each identity has its own lock guarding its name and samples.
///   [`append_sample`](Self::append_sample) takes only that identity's lock
///   exclusively, so appends to different identities run in parallel.
///
/// Locks are always acquired outer before inner, and inner locks in id
/// order. The backing store is only touched with no lock held.
pub struct Registry {
    dim: usize,
    identities: RwLock<BTreeMap<String, RwLock<Entry>>>,
    store: Box<dyn IdentityStore>,
}

impl Registry {
    /// Creates an empty registry accepting embeddings of length `dim`.
    pub fn new(dim: usize, store: Box<dyn IdentityStore>) -> Result<Self, FaceError> {
        if dim == 0 {
            return Err(FaceError::InvalidConfiguration(
                "registry dimension must be positive".into(),
            ));
        }
        Ok(Self {
            dim,
            identities: RwLock::new(BTreeMap::new()),
            store,
        })
    }

    /// Creates a registry backed by a [`MemoryStore`].
    pub fn with_memory_store(dim: usize) -> Result<Self, FaceError> {
        Self::new(dim, Box::new(MemoryStore::new()))
    }

    /// Returns the embedding length this registry accepts.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Returns the backing store.
    pub fn store(&self) -> &dyn IdentityStore {
        self.store.as_ref()
    }

    /// Creates an identity with no samples. Nothing is persisted.
    pub fn enroll(&self, id: &str, display_name: &str) -> Result<(), FaceError> {
        let mut map = self.identities.write();
        if map.contains_key(id) {
            return Err(FaceError::AlreadyExists(id.to_string()));
        }
        map.insert(
            id.to_string(),
            RwLock::new(Entry {
                display_name: display_name.to_string(),
                samples: Vec::new(),
            }),
        );
        tracing::debug!(id, "faceid: enrolled identity");
        Ok(())
    }

    /// Appends one embedding to `id`, preserving insertion order.
    /// Returns the new sample count.
    pub fn append_sample(&self, id: &str, embedding: &[f32]) -> Result<usize, FaceError> {
        let map = self.identities.read();
        let entry = map.get(id).ok_or_else(|| FaceError::NotFound(id.to_string()))?;
        if embedding.len() != self.dim {
            return Err(FaceError::DimensionMismatch {
                expected: self.dim,
                got: embedding.len(),
            });
        }
        let mut entry = entry.write();
        entry.samples.push(Arc::from(embedding));
        Ok(entry.samples.len())
    }

    /// Removes `id` and all its samples in one step.
    pub fn remove(&self, id: &str) -> Result<(), FaceError> {
        let mut map = self.identities.write();
        map.remove(id)
            .ok_or_else(|| FaceError::NotFound(id.to_string()))?;
        tracing::debug!(id, "faceid: removed identity");
        Ok(())
    }

    /// Changes the display name of `id`.
    pub fn set_display_name(&self, id: &str, display_name: &str) -> Result<(), FaceError> {
        let map = self.identities.read();
        let entry = map.get(id).ok_or_else(|| FaceError::NotFound(id.to_string()))?;
        entry.write().display_name = display_name.to_string();
        Ok(())
    }

    /// Returns an independent copy of `id`.
    pub fn get(&self, id: &str) -> Result<Identity, FaceError> {
        let map = self.identities.read();
        let entry = map.get(id).ok_or_else(|| FaceError::NotFound(id.to_string()))?;
        let copy = entry.read().to_identity(id);
        Ok(copy)
    }

    /// Returns independent copies of every identity, ordered by id.
    pub fn list_all(&self) -> Vec<Identity> {
        let map = self.identities.read();
        let guards = lock_all(&map);
        guards.iter().map(|(id, e)| e.to_identity(id)).collect()
    }

    /// Returns the number of samples enrolled for `id`.
    pub fn sample_count(&self, id: &str) -> Result<usize, FaceError> {
        let map = self.identities.read();
        let entry = map.get(id).ok_or_else(|| FaceError::NotFound(id.to_string()))?;
        let n = entry.read().samples.len();
        Ok(n)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.identities.read().contains_key(id)
    }

    /// Returns the number of enrolled identities.
    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Captures a consistent view of the registry.
    ///
    /// Every per-identity lock is held at once while copying, so the result
    /// never mixes a finished append on one identity with a stale view of
    /// another.
    pub fn snapshot(&self) -> Snapshot {
        let map = self.identities.read();
        let guards = lock_all(&map);
        let identities = guards
            .iter()
            .map(|(id, e)| SnapshotIdentity {
                id: id.to_string(),
                display_name: e.display_name.clone(),
                samples: e.samples.clone(),
            })
            .collect();
        Snapshot { identities }
    }

    /// Matches `query` against a fresh snapshot with the brute-force matcher.
    pub fn best_match(&self, query: &[f32], threshold: f32) -> MatchResult {
        LinearMatcher.match_query(query, &self.snapshot(), threshold)
    }

    /// Writes the current state of `id` to the backing store.
    pub fn persist(&self, id: &str) -> Result<(), FaceError> {
        let identity = self.get(id)?;
        self.store.save(&identity)?;
        tracing::debug!(id, samples = identity.samples.len(), "faceid: persisted identity");
        Ok(())
    }

    /// Writes every identity to the backing store. Stops at the first error.
    /// Records in the store that are no longer registered are left alone.
    pub fn persist_all(&self) -> Result<usize, FaceError> {
        let all = self.list_all();
        for identity in &all {
            self.store.save(identity)?;
        }
        tracing::debug!(count = all.len(), "faceid: persisted all identities");
        Ok(all.len())
    }

    /// Deletes `id` from the backing store. The in-memory registry is not
    /// touched.
    pub fn unpersist(&self, id: &str) -> Result<(), FaceError> {
        self.store.delete(id)?;
        Ok(())
    }

    /// Replaces the in-memory state with every record in the backing store.
    ///
    /// All-or-nothing: if any stored sample has the wrong dimension the
    /// registry is left unchanged. Returns the number of identities loaded.
    pub fn restore(&self) -> Result<usize, FaceError> {
        let records = self.store.load_all()?;
        for record in &records {
            if let Some(bad) = record.samples.iter().find(|s| s.len() != self.dim) {
                return Err(FaceError::DimensionMismatch {
                    expected: self.dim,
                    got: bad.len(),
                });
            }
        }

        let restored: BTreeMap<String, RwLock<Entry>> = records
            .into_iter()
            .map(|p| {
                let entry = Entry {
                    display_name: p.display_name,
                    samples: p.samples.into_iter().map(Arc::from).collect(),
                };
                (p.id, RwLock::new(entry))
            })
            .collect();
        let n = restored.len();

        *self.identities.write() = restored;
        tracing::info!(identities = n, "faceid: restored registry from store");
        Ok(n)
    }

    /// Closes the backing store.
    pub fn close(&self) -> Result<(), FaceError> {
        self.store.close()?;
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("dim", &self.dim)
            .field("identities", &self.len())
            .finish()
    }
}

/// Read-locks every entry in id order.
fn lock_all<'a>(
    map: &'a BTreeMap<String, RwLock<Entry>>,
) -> Vec<(&'a str, RwLockReadGuard<'a, Entry>)> {
    map.iter().map(|(id, e)| (id.as_str(), e.read())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(dim: usize) -> Registry {
        Registry::with_memory_store(dim).unwrap()
    }

    #[test]
    fn zero_dimension_rejected() {
        assert!(matches!(
            Registry::with_memory_store(0),
            Err(FaceError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn enroll_append_remove_round_trip() {
        let r = reg(3);
        r.enroll("X", "Alice").unwrap();
        assert_eq!(r.sample_count("X").unwrap(), 0);

        assert_eq!(r.append_sample("X", &[1.0, 0.0, 0.0]).unwrap(), 1);
        assert_eq!(r.sample_count("X").unwrap(), 1);

        r.remove("X").unwrap();
        assert!(matches!(r.get("X"), Err(FaceError::NotFound(_))));
        assert!(matches!(r.sample_count("X"), Err(FaceError::NotFound(_))));
        assert!(r.is_empty());
    }

    #[test]
    fn duplicate_enroll_keeps_first() {
        let r = reg(3);
        r.enroll("X", "Alice").unwrap();
        assert!(matches!(r.enroll("X", "Bob"), Err(FaceError::AlreadyExists(id)) if id == "X"));
        assert_eq!(r.get("X").unwrap().display_name, "Alice");
    }

    #[test]
    fn append_errors() {
        let r = reg(3);
        assert!(matches!(r.append_sample("nobody", &[1.0, 0.0, 0.0]), Err(FaceError::NotFound(_))));

        r.enroll("X", "").unwrap();
        assert!(matches!(
            r.append_sample("X", &[1.0, 0.0]),
            Err(FaceError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert_eq!(r.sample_count("X").unwrap(), 0);
    }

    #[test]
    fn remove_missing() {
        assert!(matches!(reg(3).remove("X"), Err(FaceError::NotFound(_))));
    }

    #[test]
    fn samples_keep_insertion_order() {
        let r = reg(2);
        r.enroll("X", "").unwrap();
        for i in 0..5 {
            r.append_sample("X", &[i as f32, 1.0]).unwrap();
        }
        let firsts: Vec<f32> = r.get("X").unwrap().samples.iter().map(|s| s[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn get_returns_independent_copy() {
        let r = reg(2);
        r.enroll("X", "Alice").unwrap();
        r.append_sample("X", &[1.0, 0.0]).unwrap();

        let mut copy = r.get("X").unwrap();
        copy.display_name = "Mallory".into();
        copy.samples[0][0] = 42.0;
        copy.samples.clear();

        let fresh = r.get("X").unwrap();
        assert_eq!(fresh.display_name, "Alice");
        assert_eq!(fresh.samples, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn list_all_sorted() {
        let r = reg(1);
        for id in ["c", "a", "b"] {
            r.enroll(id, "").unwrap();
        }
        let ids: Vec<String> = r.list_all().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(r.len(), 3);
        assert!(r.contains("b"));
        assert!(!r.contains("d"));
    }

    #[test]
    fn set_display_name() {
        let r = reg(1);
        r.enroll("X", "Alice").unwrap();
        r.set_display_name("X", "Alicia").unwrap();
        assert_eq!(r.get("X").unwrap().display_name, "Alicia");
        assert!(matches!(r.set_display_name("Y", ""), Err(FaceError::NotFound(_))));
    }

    #[test]
    fn snapshot_is_frozen() {
        let r = reg(2);
        r.enroll("A", "").unwrap();
        r.append_sample("A", &[1.0, 0.0]).unwrap();

        let snap = r.snapshot();
        r.append_sample("A", &[0.0, 1.0]).unwrap();
        r.enroll("B", "").unwrap();

        assert_eq!(snap.len(), 1);
        assert_eq!(snap.sample_count(), 1);
        assert_eq!(r.snapshot().sample_count(), 2);
    }

    #[test]
    fn concurrent_appends_to_one_identity() {
        const N: usize = 64;
        let r = reg(4);
        r.enroll("X", "").unwrap();

        std::thread::scope(|s| {
            for i in 0..N {
                let r = &r;
                s.spawn(move || {
                    r.append_sample("X", &[i as f32, 0.0, 0.0, 1.0]).unwrap();
                });
            }
        });

        assert_eq!(r.sample_count("X").unwrap(), N);
        let mut firsts: Vec<usize> = r
            .get("X")
            .unwrap()
            .samples
            .iter()
            .map(|s| s[0] as usize)
            .collect();
        firsts.sort_unstable();
        assert_eq!(firsts, (0..N).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_appends_readers_and_writers() {
        let r = reg(2);
        for id in ["A", "B", "C", "D"] {
            r.enroll(id, "").unwrap();
        }

        std::thread::scope(|s| {
            for id in ["A", "B", "C", "D"] {
                let r = &r;
                s.spawn(move || {
                    for i in 0..100 {
                        r.append_sample(id, &[1.0, i as f32]).unwrap();
                    }
                });
            }
            for _ in 0..4 {
                let r = &r;
                s.spawn(move || {
                    for _ in 0..50 {
                        let snap = r.snapshot();
                        assert!(snap.len() >= 4);
                        let _ = r.best_match(&[1.0, 0.0], 0.5);
                    }
                });
            }
            let r = &r;
            s.spawn(move || {
                for i in 0..50 {
                    let id = format!("tmp{i}");
                    r.enroll(&id, "").unwrap();
                    r.remove(&id).unwrap();
                }
            });
        });

        for id in ["A", "B", "C", "D"] {
            assert_eq!(r.sample_count(id).unwrap(), 100);
        }
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn persist_and_restore() {
        let r = reg(2);
        r.enroll("A", "Alice").unwrap();
        r.append_sample("A", &[1.0, 0.0]).unwrap();
        r.enroll("B", "Bob").unwrap();
        assert_eq!(r.persist_all().unwrap(), 2);

        r.remove("A").unwrap();
        r.enroll("Z", "").unwrap();
        assert_eq!(r.restore().unwrap(), 2);

        let ids: Vec<String> = r.list_all().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(r.get("A").unwrap().samples, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn persist_single_and_unpersist() {
        let r = reg(2);
        r.enroll("A", "Alice").unwrap();
        r.persist("A").unwrap();
        assert!(r.store().exists("A").unwrap());
        assert!(matches!(r.persist("nobody"), Err(FaceError::NotFound(_))));

        r.unpersist("A").unwrap();
        assert!(!r.store().exists("A").unwrap());
        assert!(r.contains("A"));
        assert!(matches!(r.unpersist("A"), Err(FaceError::NotFound(_))));
    }

    #[test]
    fn restore_rejects_wrong_dimension() {
        let store = MemoryStore::new();
        store
            .save(&Identity::with_samples("A", "", vec![vec![1.0, 0.0, 0.0]]))
            .unwrap();
        let r = Registry::new(2, Box::new(store)).unwrap();
        r.enroll("keep", "").unwrap();

        assert!(matches!(
            r.restore(),
            Err(FaceError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(r.contains("keep"));
        assert!(!r.contains("A"));
    }
}
