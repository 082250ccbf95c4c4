use crate::cache::{ManifestCache, SharedDocument};
use crate::document::ManifestDocument;
use crate::path::{is_folder_like, relative_to};
use crate::persist::write_manifest;
use crate::xml::{to_xml_bytes, FormatOptions};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::MutexGuard;

/// A resolved manifest: its location plus the cached document behind it.
#[derive(Clone)]
pub struct ManifestHandle {
    path: PathBuf,
    name: String,
    document: SharedDocument,
    cache: Arc<ManifestCache>,
}

impl std::fmt::Debug for ManifestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestHandle")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ManifestHandle {
    /// Resolve `path` through `cache`, loading it on a miss.
    pub async fn open(cache: Arc<ManifestCache>, path: &Path) -> Result<Self> {
        let document = cache.get(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            document,
            cache,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Lock the document for a check-then-mutate sequence.
    pub async fn edit(&self) -> ManifestEdit<'_> {
        ManifestEdit {
            handle: self,
            doc: self.document.lock().await,
        }
    }

    pub async fn has_entry(&self, target: &Path) -> bool {
        self.edit().await.has_entry(target)
    }

    pub async fn add_entry(&self, target: &Path, category: &str) {
        self.edit().await.add_entry(target, category);
    }

    pub async fn remove_entry(&self, target: &Path, is_directory: bool) -> bool {
        self.edit().await.remove_entry(target, is_directory)
    }

    pub async fn persist(&self) -> Result<()> {
        self.edit().await.persist().await
    }
}

/// Exclusive access to a manifest document.
///
/// Holding it across a membership check, a mutation and [`persist`](Self::persist)
/// keeps interleaved events from duplicating or losing an edit.
pub struct ManifestEdit<'a> {
    handle: &'a ManifestHandle,
    doc: MutexGuard<'a, ManifestDocument>,
}

impl ManifestEdit<'_> {
    #[must_use]
    pub fn document(&self) -> &ManifestDocument {
        &self.doc
    }

    /// Exact match on the relative path, without a folder separator.
    #[must_use]
    pub fn has_entry(&self, target: &Path) -> bool {
        self.doc
            .contains(&relative_to(&self.handle.path, target, false))
    }

    /// Exact match on the folder form (`dir\`) of `target`.
    #[must_use]
    pub fn has_folder_entry(&self, target: &Path) -> bool {
        self.doc
            .contains(&relative_to(&self.handle.path, target, true))
    }

    /// `target` or anything below it is listed.
    #[must_use]
    pub fn has_entry_tree(&self, target: &Path) -> bool {
        self.doc
            .contains_tree(&relative_to(&self.handle.path, target, false))
    }

    /// Append `target` under `category`. Callers check membership first: adding
    /// an existing path produces a second entry.
    pub fn add_entry(&mut self, target: &Path, category: &str) {
        let include = relative_to(&self.handle.path, target, true);
        self.doc.insert(category, &include);
    }

    /// Remove `target`, or with `is_directory` everything below it as well.
    pub fn remove_entry(&mut self, target: &Path, is_directory: bool) -> bool {
        let include = relative_to(&self.handle.path, target, false);
        if is_directory {
            self.doc.remove_tree(&include)
        } else {
            self.doc.remove(&include)
        }
    }

    /// Removal using the deleted-path heuristic to decide directory-ness.
    pub fn remove_deleted(&mut self, target: &Path) -> bool {
        self.remove_entry(target, is_folder_like(target))
    }

    pub async fn persist(&self) -> Result<()> {
        self.persist_with(FormatOptions::default()).await
    }

    /// Write the document back to its file and republish it in the cache.
    pub async fn persist_with(&self, options: FormatOptions) -> Result<()> {
        let bytes = to_xml_bytes(&self.handle.path, &self.doc, options)?;

        let cache = &self.handle.cache;
        let _pause = cache.pause_invalidation(&self.handle.path)?;
        write_manifest(&self.handle.path, bytes).await?;
        cache.publish(&self.handle.path, Arc::clone(&self.handle.document))
    }
}
