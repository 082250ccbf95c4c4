use crate::cache::ManifestCache;
use crate::handle::ManifestHandle;
use crate::path::{absolutize, normalize_lexically};
use crate::{ManifestError, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directories the manifest search must not walk past.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceRoots {
    boundaries: Vec<PathBuf>,
}

impl WorkspaceRoots {
    /// Boundaries are the parents of the workspace folders, so a manifest sitting
    /// directly in a workspace folder is still found.
    pub fn from_workspace_folders<I, P>(folders: I) -> std::io::Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut boundaries = Vec::new();
        for folder in folders {
            let folder = absolutize(folder.as_ref())?;
            let parent = folder.parent().map(Path::to_path_buf).unwrap_or(folder);
            if !boundaries.contains(&parent) {
                boundaries.push(parent);
            }
        }
        Ok(Self { boundaries })
    }

    #[must_use]
    pub fn from_boundaries(boundaries: Vec<PathBuf>) -> Self {
        Self {
            boundaries: boundaries.iter().map(|b| normalize_lexically(b)).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, dir: &Path) -> bool {
        self.boundaries.iter().any(|b| b == dir)
    }

    #[must_use]
    pub fn boundaries(&self) -> &[PathBuf] {
        &self.boundaries
    }
}

/// Path of the nearest `*.{extension}` file at or above `start_dir`.
///
/// Files are compared in name order and the first match wins. The walk stops
/// with [`ManifestError::NoManifestFound`] once the next parent is a boundary or
/// the file-system root has been searched. Directories that no longer exist
/// (a deleted folder) are skipped.
pub async fn find_manifest_path(
    start_dir: &Path,
    extension: &str,
    roots: &WorkspaceRoots,
) -> Result<PathBuf> {
    let start = absolutize(start_dir)?;
    let suffix = format!(".{extension}");
    let mut current = start.clone();

    loop {
        if let Some(found) = manifest_in_dir(&current, &suffix).await? {
            debug!("found {} for {}", found.display(), start.display());
            return Ok(found);
        }

        let parent = match current.parent() {
            Some(parent) => parent.to_path_buf(),
            None => current.clone(),
        };
        if roots.contains(&parent) || parent == current {
            return Err(ManifestError::NoManifestFound {
                extension: extension.to_string(),
                start,
            });
        }
        current = parent;
    }
}

async fn manifest_in_dir(dir: &Path, suffix: &str) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(suffix) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            continue;
        }
        candidates.push(name);
    }
    candidates.sort();
    Ok(candidates.into_iter().next().map(|name| dir.join(name)))
}

/// Resolves the manifest owning a file and opens it through the shared cache.
#[derive(Clone)]
pub struct ManifestLocator {
    cache: Arc<ManifestCache>,
    extension: String,
    roots: WorkspaceRoots,
}

impl ManifestLocator {
    pub fn new(
        cache: Arc<ManifestCache>,
        extension: impl Into<String>,
        roots: WorkspaceRoots,
    ) -> Self {
        Self {
            cache,
            extension: extension.into(),
            roots,
        }
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn roots(&self) -> &WorkspaceRoots {
        &self.roots
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ManifestCache> {
        &self.cache
    }

    pub fn set_roots(&mut self, roots: WorkspaceRoots) {
        self.roots = roots;
    }

    /// `true` for the manifest files themselves.
    #[must_use]
    pub fn is_manifest_path(&self, path: &Path) -> bool {
        path.to_string_lossy()
            .ends_with(&format!(".{}", self.extension))
    }

    pub async fn locate(&self, start_dir: &Path) -> Result<ManifestHandle> {
        let path = find_manifest_path(start_dir, &self.extension, &self.roots).await?;
        ManifestHandle::open(Arc::clone(&self.cache), &path).await
    }

    /// Manifest for `file`, searching from its parent directory.
    pub async fn locate_for_file(&self, file: &Path) -> Result<ManifestHandle> {
        let file = absolutize(file)?;
        let dir = file
            .parent()
            .ok_or_else(|| ManifestError::InvalidPath(file.display().to_string()))?;
        self.locate(dir).await
    }
}
