use crate::document::ManifestDocument;
use crate::path::absolutize;
use crate::xml::{decode_manifest_bytes, parse_manifest};
use crate::Result;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A parsed manifest shared between the cache and every handle on it.
pub type SharedDocument = Arc<tokio::sync::Mutex<ManifestDocument>>;

/// One parsed document per manifest path.
///
/// The map lock is only taken for lookups and inserts and is never held across
/// an await; edits go through the per-document async mutex.
#[derive(Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<PathBuf, SharedDocument>>,
    /// Write-in-progress count per manifest path.
    paused: Mutex<HashMap<PathBuf, usize>>,
}

/// Keeps [`ManifestCache::invalidate`] a no-op for one path while alive.
pub struct InvalidationPause<'a> {
    cache: &'a ManifestCache,
    key: PathBuf,
}

impl Drop for InvalidationPause<'_> {
    fn drop(&mut self) {
        let mut paused = self.cache.paused();
        if let Some(count) = paused.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                paused.remove(&self.key);
            }
        }
    }
}

impl ManifestCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, SharedDocument>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn paused(&self) -> MutexGuard<'_, HashMap<PathBuf, usize>> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached document for `path`, parsing it from disk on a miss.
    ///
    /// Repeated calls return the same instance until the entry is invalidated.
    pub async fn get(&self, path: &Path) -> Result<SharedDocument> {
        let key = absolutize(path)?;
        if let Some(doc) = self.entries().get(&key) {
            return Ok(Arc::clone(doc));
        }

        debug!("loading manifest {}", key.display());
        let bytes = tokio::fs::read(&key).await?;
        let text = decode_manifest_bytes(&bytes);
        let parsed = parse_manifest(&key, &text)?;

        // Another task may have loaded the same file while we were reading.
        let mut entries = self.entries();
        let doc = entries
            .entry(key)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(parsed)));
        Ok(Arc::clone(doc))
    }

    #[must_use]
    pub fn peek(&self, path: &Path) -> Option<SharedDocument> {
        let key = absolutize(path).ok()?;
        self.entries().get(&key).cloned()
    }

    /// Drop one entry so the next [`get`](Self::get) re-reads the file.
    ///
    /// Returns `false` when nothing was cached or invalidation of `path` is paused.
    pub fn invalidate(&self, path: &Path) -> bool {
        let Ok(key) = absolutize(path) else {
            return false;
        };
        if self.paused().contains_key(&key) {
            debug!("invalidation paused, keeping {}", key.display());
            return false;
        }
        self.entries().remove(&key).is_some()
    }

    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    /// Store `doc` as the current state of `path`.
    pub fn publish(&self, path: &Path, doc: SharedDocument) -> Result<()> {
        let key = absolutize(path)?;
        self.entries().insert(key, doc);
        Ok(())
    }

    /// Ignore [`invalidate`](Self::invalidate) for `path` until the guard drops.
    /// Other paths stay invalidatable.
    pub fn pause_invalidation(&self, path: &Path) -> Result<InvalidationPause<'_>> {
        let key = absolutize(path)?;
        *self.paused().entry(key.clone()).or_default() += 1;
        Ok(InvalidationPause { cache: self, key })
    }

    /// Forget `path` regardless of any pause. Used when a write failed and the
    /// cached document no longer matches the file.
    pub fn evict(&self, path: &Path) -> bool {
        let Ok(key) = absolutize(path) else {
            return false;
        };
        self.entries().remove(&key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Session teardown.
    pub fn shutdown(&self) {
        debug!("dropping {} cached manifests", self.len());
        self.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::ManifestCache;
    use std::sync::Arc;
    use tempfile::tempdir;

    const MANIFEST: &str = "<Project><ItemGroup><Content Include=\"a.txt\" /></ItemGroup></Project>";

    #[tokio::test]
    async fn repeated_get_returns_same_instance() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.njsproj");
        std::fs::write(&path, MANIFEST).unwrap();

        let cache = ManifestCache::new();
        let first = cache.get(&path).await.unwrap();
        std::fs::write(&path, "<Project />").unwrap();
        let second = cache.get(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.lock().await.contains("a.txt"));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.njsproj");
        std::fs::write(&path, MANIFEST).unwrap();

        let cache = ManifestCache::new();
        let first = cache.get(&path).await.unwrap();
        std::fs::write(&path, "<Project />").unwrap();
        assert!(cache.invalidate(&path));
        let second = cache.get(&path).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.lock().await.contains("a.txt"));
    }

    #[tokio::test]
    async fn paused_invalidation_keeps_entry() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.njsproj");
        std::fs::write(&path, MANIFEST).unwrap();

        let cache = ManifestCache::new();
        cache.get(&path).await.unwrap();
        {
            let _pause = cache.pause_invalidation(&path).unwrap();
            assert!(!cache.invalidate(&path));
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(&path));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn pause_is_scoped_to_one_manifest() {
        let temp = tempdir().unwrap();
        let writing = temp.path().join("a.njsproj");
        let failed = temp.path().join("b.njsproj");
        std::fs::write(&writing, MANIFEST).unwrap();
        std::fs::write(&failed, MANIFEST).unwrap();

        let cache = ManifestCache::new();
        cache.get(&writing).await.unwrap();
        cache.get(&failed).await.unwrap();

        let _pause = cache.pause_invalidation(&writing).unwrap();
        assert!(cache.invalidate(&failed));
        assert!(!cache.invalidate(&writing));
        assert!(cache.evict(&writing));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidate_all_empties_cache() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a.njsproj");
        let b = temp.path().join("b.njsproj");
        std::fs::write(&a, MANIFEST).unwrap();
        std::fs::write(&b, MANIFEST).unwrap();

        let cache = ManifestCache::new();
        cache.get(&a).await.unwrap();
        cache.get(&b).await.unwrap();
        assert_eq!(cache.len(), 2);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn parse_failure_leaves_other_entries_intact() {
        let temp = tempdir().unwrap();
        let good = temp.path().join("good.njsproj");
        let bad = temp.path().join("bad.njsproj");
        std::fs::write(&good, MANIFEST).unwrap();
        std::fs::write(&bad, "<Project>").unwrap();

        let cache = ManifestCache::new();
        cache.get(&good).await.unwrap();
        assert!(cache.get(&bad).await.is_err());
        assert_eq!(cache.len(), 1);
    }
}
