//! Persistent per-item generation seeds.
//!
//! Every item id keeps the seed it was first given, so regenerating an
//! image after a failed or interrupted run reproduces the same result.
//! The store is a pretty-printed JSON object `{ "<item id>": <u32> }`,
//! rewritten in full on every [`SeedStore::persist`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::CoreError;

/// Item id to seed mapping.
pub type SeedMapping = BTreeMap<String, u32>;

/// A seed mapping bound to its backing file.
#[derive(Debug, Clone)]
pub struct SeedStore {
    path: PathBuf,
    seeds: SeedMapping,
}

impl SeedStore {
    /// An empty store that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seeds: SeedMapping::new(),
        }
    }

    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store. A corrupt file is logged and
    /// also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No seed store yet, starting empty");
                return Self::new(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read seed store, starting empty");
                return Self::new(path);
            }
        };

        match serde_json::from_str::<SeedMapping>(&text) {
            Ok(seeds) => {
                tracing::info!(path = %path.display(), seeds = seeds.len(), "Loaded seed store");
                Self { path, seeds }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Seed store is corrupt, starting empty");
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<u32> {
        self.seeds.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn mapping(&self) -> &SeedMapping {
        &self.seeds
    }

    /// Return the seed for `id`, minting a random one if none exists.
    ///
    /// The boolean is `true` when the seed was minted by this call.
    pub fn ensure(&mut self, id: &str) -> (u32, bool) {
        self.ensure_with(id, &mut rand::rng())
    }

    /// [`ensure`](Self::ensure) with an explicit random source.
    pub fn ensure_with<R: Rng>(&mut self, id: &str, rng: &mut R) -> (u32, bool) {
        if let Some(seed) = self.get(id) {
            return (seed, false);
        }
        let seed: u32 = rng.random();
        self.seeds.insert(id.to_string(), seed);
        (seed, true)
    }

    /// Overwrite the backing file with the full mapping.
    ///
    /// Writes to a sibling temp file first and renames it into place, so a
    /// crash mid-write leaves the previous store intact.
    pub async fn persist(&self) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(&self.seeds)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| CoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| CoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), seeds = self.seeds.len(), "Seed store persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn ensure_mints_once_then_reuses() {
        let mut store = SeedStore::new("unused.json");
        let mut rng = StdRng::seed_from_u64(7);

        let (first, is_new) = store.ensure_with("a", &mut rng);
        assert!(is_new);
        let (second, is_new) = store.ensure_with("a", &mut rng);
        assert!(!is_new);
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn seeds_survive_persist_and_reload() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("item_seeds.json");

        let mut store = SeedStore::load(&path);
        assert!(store.is_empty());
        let (seed, _) = store.ensure("tshirt-crewneck-regular-white");
        store.persist().await.expect("persist");

        let mut reloaded = SeedStore::load(&path);
        assert_eq!(reloaded.ensure("tshirt-crewneck-regular-white"), (seed, false));
    }

    #[tokio::test]
    async fn persisted_file_is_pretty_json_object() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("item_seeds.json");

        let mut store = SeedStore::new(&path);
        store.seeds.insert("b".into(), 2);
        store.seeds.insert("a".into(), 4_294_967_295);
        store.persist().await.expect("persist");

        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text, "{\n  \"a\": 4294967295,\n  \"b\": 2\n}");
    }

    #[test]
    fn corrupt_store_loads_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("item_seeds.json");
        std::fs::write(&path, "{\"a\": -1}").expect("write");

        let store = SeedStore::load(&path);
        assert!(store.is_empty());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn persist_is_idempotent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("item_seeds.json");

        let mut store = SeedStore::new(&path);
        store.ensure("a");
        store.persist().await.expect("first persist");
        let first = std::fs::read_to_string(&path).expect("read");
        store.persist().await.expect("second persist");
        let second = std::fs::read_to_string(&path).expect("read");
        assert_eq!(first, second);
    }
}
