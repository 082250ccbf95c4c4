use crate::batcher::PendingRemoval;
use crate::config::{PathFilter, SyncConfig};
use crate::ignore_list::IgnoreList;
use crate::scanner::FolderScanner;
use crate::{Result, SyncError};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use vsproj_manifest::{
    is_folder_like, ManifestCache, ManifestEdit, ManifestHandle, ManifestLocator, WorkspaceRoots,
};

/// Answer to "add this file to the project?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddDecision {
    Accept,
    /// Not this time.
    Decline,
    /// Never for this path: it goes on the ignore list.
    Suppress,
}

pub trait AddPrompt: Send + Sync {
    fn decide(&self, path: &Path, manifest_name: &str) -> AddDecision;
}

/// Adds everything without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl AddPrompt for AcceptAll {
    fn decide(&self, _path: &Path, _manifest_name: &str) -> AddDecision {
        AddDecision::Accept
    }
}

/// Receives messages meant for the user.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Rejected by include/exclude patterns.
    Filtered,
    /// On the ignore list.
    Ignored,
    /// The manifest itself, or a path without a directory part.
    NotAProjectFile,
}

/// What handling one path amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Added { path: PathBuf, manifest: PathBuf },
    AlreadyListed { path: PathBuf, manifest: PathBuf },
    Removed { path: PathBuf, manifest: PathBuf },
    NotListed { path: PathBuf, manifest: PathBuf },
    Declined { path: PathBuf },
    Suppressed { path: PathBuf },
    Skipped { path: PathBuf, reason: SkipReason },
    NoManifest { path: PathBuf },
    Queued { path: PathBuf, manifest: PathBuf },
    Cancelled { path: PathBuf },
    Invalidated { manifest: PathBuf },
    Failed { path: PathBuf, error: String },
}

/// Translates file-system changes into manifest edits.
pub struct ProjectSync {
    config: SyncConfig,
    filter: PathFilter,
    locator: ManifestLocator,
    ignore: TokioMutex<IgnoreList>,
    prompt: Arc<dyn AddPrompt>,
    notifier: Arc<dyn Notifier>,
}

impl ProjectSync {
    pub fn new(
        config: SyncConfig,
        cache: Arc<ManifestCache>,
        roots: WorkspaceRoots,
        ignore: IgnoreList,
    ) -> Result<Self> {
        config.validate()?;
        let filter = PathFilter::from_config(&config)?;
        let locator = ManifestLocator::new(cache, config.proj_extension.clone(), roots);
        Ok(Self {
            config,
            filter,
            locator,
            ignore: TokioMutex::new(ignore),
            prompt: Arc::new(AcceptAll),
            notifier: Arc::new(LogNotifier),
        })
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn AddPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub const fn locator(&self) -> &ManifestLocator {
        &self.locator
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ManifestCache> {
        self.locator.cache()
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    #[must_use]
    pub fn passes_filter(&self, path: &Path) -> bool {
        self.filter.allows(path)
    }

    /// Why `path` must be left alone, if it must.
    pub async fn skip_reason(&self, path: &Path) -> Option<SkipReason> {
        if self.ignore.lock().await.contains(path) {
            return Some(SkipReason::Ignored);
        }
        (!self.filter.allows(path)).then_some(SkipReason::Filtered)
    }

    /// Not ignored by the user and accepted by the path patterns.
    pub async fn is_desired(&self, path: &Path) -> bool {
        self.skip_reason(path).await.is_none()
    }

    pub async fn ignored_paths(&self) -> Vec<String> {
        self.ignore.lock().await.paths().to_vec()
    }

    pub async fn clear_ignored_paths(&self) -> Result<()> {
        self.ignore.lock().await.clear().await
    }

    pub fn invalidate_manifest(&self, manifest: &Path) -> bool {
        self.cache().invalidate(manifest)
    }

    pub fn invalidate_all_manifests(&self) {
        self.cache().invalidate_all();
    }

    fn is_project_file(&self, path: &Path) -> bool {
        let has_dir = path.parent().is_some_and(|p| !p.as_os_str().is_empty());
        has_dir && !self.locator.is_manifest_path(path)
    }

    /// Add a file, or a directory together with the files below it.
    pub async fn add_path(&self, path: &Path) -> Result<Vec<SyncOutcome>> {
        if !self.is_project_file(path) {
            return Ok(vec![SyncOutcome::Skipped {
                path: path.to_path_buf(),
                reason: SkipReason::NotAProjectFile,
            }]);
        }
        if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
            return self.add_directory(path).await;
        }
        let (outcome, _) = self.add_one(path, false, false).await?;
        Ok(vec![outcome])
    }

    /// Add `dir` as a folder entry and every desired file below it, writing each
    /// touched manifest once at the end.
    pub async fn add_directory(&self, dir: &Path) -> Result<Vec<SyncOutcome>> {
        if let Some(reason) = self.skip_reason(dir).await {
            return Ok(vec![SyncOutcome::Skipped {
                path: dir.to_path_buf(),
                reason,
            }]);
        }

        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || FolderScanner::new(root).scan())
            .await
            .map_err(|err| SyncError::Other(format!("join folder scan: {err}")))?;

        let mut outcomes = Vec::new();
        let mut touched: Vec<ManifestHandle> = Vec::new();

        let (outcome, handle) = self.add_one(dir, true, true).await?;
        outcomes.push(outcome);
        remember(&mut touched, handle);

        for file in files {
            if !self.is_project_file(&file) || !self.is_desired(&file).await {
                continue;
            }
            match self.add_one(&file, true, false).await {
                Ok((outcome, handle)) => {
                    outcomes.push(outcome);
                    remember(&mut touched, handle);
                }
                Err(err) => {
                    self.notifier.error(&err.to_string());
                    outcomes.push(SyncOutcome::Failed {
                        path: file,
                        error: err.to_string(),
                    });
                }
            }
        }

        // Every touched manifest gets its write attempt; a failure on one must
        // not leave the others holding unwritten edits in the cache.
        let mut first_failure = None;
        for handle in touched {
            let edit = handle.edit().await;
            if let Err(err) = self.persist(&edit, &handle).await {
                if first_failure.is_some() {
                    self.notifier.error(&err.to_string());
                } else {
                    first_failure = Some(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    async fn add_one(
        &self,
        path: &Path,
        bulk: bool,
        is_dir: bool,
    ) -> Result<(SyncOutcome, Option<ManifestHandle>)> {
        let name = file_name(path);
        info!("vsproj#trigger({name})#add");

        let Some(handle) = self.resolve(path, bulk).await? else {
            return Ok((
                SyncOutcome::NoManifest {
                    path: path.to_path_buf(),
                },
                None,
            ));
        };
        let manifest = handle.path().to_path_buf();

        let decision = {
            let mut edit = handle.edit().await;
            // Extension-less paths are written in folder form, directory or not.
            let listed = edit.has_entry(path) || edit.has_folder_entry(path);
            if listed {
                debug!("vsproj#trigger({name}): already in {}", handle.name());
                return Ok((
                    SyncOutcome::AlreadyListed {
                        path: path.to_path_buf(),
                        manifest,
                    },
                    None,
                ));
            }

            let decision = self.prompt.decide(path, handle.name());
            if decision == AddDecision::Accept {
                let category = self.config.item_type.category_for(path, is_dir);
                edit.add_entry(path, &category);
                if !bulk {
                    self.persist(&edit, &handle).await?;
                }
            }
            decision
        };

        match decision {
            AddDecision::Accept => Ok((
                SyncOutcome::Added {
                    path: path.to_path_buf(),
                    manifest,
                },
                Some(handle),
            )),
            AddDecision::Decline => Ok((
                SyncOutcome::Declined {
                    path: path.to_path_buf(),
                },
                None,
            )),
            AddDecision::Suppress => {
                self.ignore.lock().await.add(path).await?;
                Ok((
                    SyncOutcome::Suppressed {
                        path: path.to_path_buf(),
                    },
                    None,
                ))
            }
        }
    }

    /// Remove `path` right away. Extension-less, non-hidden paths are treated as
    /// directories and take everything below them.
    pub async fn remove_path(&self, path: &Path, bulk: bool) -> Result<SyncOutcome> {
        let Some(handle) = self.resolve(path, bulk).await? else {
            return Ok(SyncOutcome::NoManifest {
                path: path.to_path_buf(),
            });
        };
        info!("vsproj#remove({})", path.display());

        let removed = {
            let mut edit = handle.edit().await;
            let removed = edit.remove_deleted(path);
            if removed {
                self.persist(&edit, &handle).await?;
            }
            removed
        };

        let manifest = handle.path().to_path_buf();
        if removed {
            return Ok(SyncOutcome::Removed {
                path: path.to_path_buf(),
                manifest,
            });
        }
        if !bulk {
            self.notifier.warn(&format!(
                "{} was not found in {}",
                file_name(path),
                handle.name()
            ));
        }
        Ok(SyncOutcome::NotListed {
            path: path.to_path_buf(),
            manifest,
        })
    }

    /// Manifest a deleted path should be queued against, if any.
    pub async fn deletion_target(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(handle) = self.resolve(path, true).await? else {
            return Ok(None);
        };
        if !is_folder_like(path) && !handle.has_entry(path).await {
            return Ok(None);
        }
        Ok(Some(handle.path().to_path_buf()))
    }

    /// Remove a batched deletion after checking it is still listed. An earlier
    /// batch, or a directory removal in this one, may already have taken it.
    pub async fn remove_pending(&self, removal: &PendingRemoval) -> Result<SyncOutcome> {
        let path = removal.path.as_path();
        let Some(handle) = self.resolve(path, true).await? else {
            return Ok(SyncOutcome::NoManifest {
                path: path.to_path_buf(),
            });
        };
        if let Some(expected) = &removal.manifest {
            if expected != handle.path() {
                debug!(
                    "{} now resolves to {} instead of {}",
                    path.display(),
                    handle.path().display(),
                    expected.display()
                );
            }
        }

        let manifest = handle.path().to_path_buf();
        let mut edit = handle.edit().await;
        let listed = if is_folder_like(path) {
            edit.has_entry_tree(path)
        } else {
            edit.has_entry(path)
        };
        if !listed {
            debug!("{} already gone from {}", path.display(), handle.name());
            return Ok(SyncOutcome::NotListed {
                path: path.to_path_buf(),
                manifest,
            });
        }

        info!("vsproj#remove({})", path.display());
        edit.remove_deleted(path);
        self.persist(&edit, &handle).await?;
        Ok(SyncOutcome::Removed {
            path: path.to_path_buf(),
            manifest,
        })
    }

    async fn resolve(&self, path: &Path, quiet: bool) -> Result<Option<ManifestHandle>> {
        match self.locator.locate_for_file(path).await {
            Ok(handle) => Ok(Some(handle)),
            Err(err) if err.is_not_found() => {
                let message = format!(
                    "Unable to locate {} for file: {}",
                    self.config.proj_extension,
                    file_name(path)
                );
                if quiet {
                    debug!("{message}");
                } else {
                    self.notifier.warn(&message);
                }
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write the manifest; on failure drop the cached copy so the next event
    /// starts again from what is on disk.
    async fn persist(&self, edit: &ManifestEdit<'_>, handle: &ManifestHandle) -> Result<()> {
        if let Err(err) = edit.persist().await {
            self.cache().evict(handle.path());
            return Err(err.into());
        }
        Ok(())
    }
}

fn remember(touched: &mut Vec<ManifestHandle>, handle: Option<ManifestHandle>) {
    if let Some(handle) = handle {
        if !touched.iter().any(|h| h.path() == handle.path()) {
            touched.push(handle);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
