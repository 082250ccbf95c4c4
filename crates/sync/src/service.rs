use crate::batcher::{DeletionBatcher, PendingRemoval};
use crate::sync::{ProjectSync, SyncOutcome};
use crate::{Result, SyncError};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant};

/// Kind of file-system change, as classified by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// A document was saved.
    Saved,
    Created,
    /// Content changed; a missing file means it was renamed away.
    Changed,
    Deleted,
    /// A document became the active one in an editor.
    Focused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncServiceConfig {
    /// Quiescence window for deletion batches.
    pub debounce: Duration,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            debounce: crate::batcher::DEFAULT_QUIESCENCE,
        }
    }
}

/// Event loop applying file events to manifests one at a time.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncServiceInner>,
}

struct SyncServiceInner {
    command_tx: mpsc::Sender<ServiceCommand>,
    update_tx: broadcast::Sender<SyncOutcome>,
}

enum ServiceCommand {
    Event(FileEvent),
    Cancel(PathBuf),
    Flush(oneshot::Sender<()>),
    Shutdown(Option<oneshot::Sender<()>>),
}

impl SyncService {
    pub fn start(sync: Arc<ProjectSync>, config: SyncServiceConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (update_tx, _) = broadcast::channel(256);

        spawn_sync_loop(sync, config, command_rx, update_tx.clone());

        Self {
            inner: Arc::new(SyncServiceInner {
                command_tx,
                update_tx,
            }),
        }
    }

    pub async fn send(&self, event: FileEvent) -> Result<()> {
        self.command(ServiceCommand::Event(event)).await
    }

    /// Queue a deleted path for the next removal batch.
    pub async fn enqueue_deletion(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(FileEvent::new(FileEventKind::Deleted, path)).await
    }

    /// Take a path back out of the pending removal batch.
    pub async fn cancel_pending_deletion(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.command(ServiceCommand::Cancel(path.into())).await
    }

    /// Run the pending deletion batch now and wait for it.
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(ServiceCommand::Flush(tx)).await?;
        rx.await
            .map_err(|e| SyncError::Other(format!("flush dropped: {e}")))
    }

    /// Finish the pending batch, drop every cached manifest and stop.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(ServiceCommand::Shutdown(Some(tx))).await?;
        rx.await
            .map_err(|e| SyncError::Other(format!("shutdown dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<SyncOutcome> {
        self.inner.update_tx.subscribe()
    }

    async fn command(&self, cmd: ServiceCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(cmd)
            .await
            .map_err(|e| SyncError::Other(format!("sync service stopped: {e}")))
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(ServiceCommand::Shutdown(None));
        }
    }
}

fn spawn_sync_loop(
    sync: Arc<ProjectSync>,
    config: SyncServiceConfig,
    mut command_rx: mpsc::Receiver<ServiceCommand>,
    update_tx: broadcast::Sender<SyncOutcome>,
) {
    tokio::spawn(async move {
        let mut batcher = DeletionBatcher::new(config.debounce);

        loop {
            let next_deadline = batcher.next_deadline();

            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ServiceCommand::Event(event)) => {
                            for outcome in route_event(&sync, &mut batcher, event).await {
                                let _ = update_tx.send(outcome);
                            }
                        }
                        Some(ServiceCommand::Cancel(path)) => {
                            if batcher.cancel(&path) {
                                let _ = update_tx.send(SyncOutcome::Cancelled { path });
                            }
                        }
                        Some(ServiceCommand::Flush(done)) => {
                            run_batch(&sync, batcher.drain(), &update_tx).await;
                            let _ = done.send(());
                        }
                        Some(ServiceCommand::Shutdown(done)) => {
                            shutdown(&sync, &mut batcher, &update_tx).await;
                            if let Some(done) = done {
                                let _ = done.send(());
                            }
                            break;
                        }
                        None => {
                            shutdown(&sync, &mut batcher, &update_tx).await;
                            break;
                        }
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    if let Some(batch) = batcher.take_due(Instant::now()) {
                        run_batch(&sync, batch, &update_tx).await;
                    }
                }
            }
        }
        debug!("sync loop stopped");
    });
}

async fn shutdown(
    sync: &ProjectSync,
    batcher: &mut DeletionBatcher,
    update_tx: &broadcast::Sender<SyncOutcome>,
) {
    info!("vsproj#deactivate");
    run_batch(sync, batcher.drain(), update_tx).await;
    sync.invalidate_all_manifests();
}

async fn run_batch(
    sync: &ProjectSync,
    batch: Vec<PendingRemoval>,
    update_tx: &broadcast::Sender<SyncOutcome>,
) {
    if batch.is_empty() {
        return;
    }
    debug!("removing {} deleted paths", batch.len());
    for removal in batch {
        let outcome = match sync.remove_pending(&removal).await {
            Ok(outcome) => outcome,
            Err(err) => failed(sync, &removal.path, &err),
        };
        let _ = update_tx.send(outcome);
    }
}

/// Apply one event. Errors stay local to the event and come back as
/// [`SyncOutcome::Failed`].
async fn route_event(
    sync: &ProjectSync,
    batcher: &mut DeletionBatcher,
    event: FileEvent,
) -> Vec<SyncOutcome> {
    let FileEvent { kind, path } = event;

    if sync.locator().is_manifest_path(&path) {
        return match kind {
            FileEventKind::Focused => Vec::new(),
            _ => {
                sync.invalidate_manifest(&path);
                vec![SyncOutcome::Invalidated { manifest: path }]
            }
        };
    }

    let mut outcomes = Vec::new();
    let result = match kind {
        FileEventKind::Created => {
            if batcher.cancel(&path) {
                debug!("{} re-created before its removal ran", path.display());
                outcomes.push(SyncOutcome::Cancelled { path: path.clone() });
            }
            add_if_desired(sync, &path).await
        }
        FileEventKind::Saved | FileEventKind::Focused => add_if_desired(sync, &path).await,
        FileEventKind::Changed => changed(sync, &path).await,
        FileEventKind::Deleted => deleted(sync, batcher, &path).await,
    };

    match result {
        Ok(mut produced) => outcomes.append(&mut produced),
        Err(err) => outcomes.push(failed(sync, &path, &err)),
    }
    outcomes
}

async fn add_if_desired(sync: &ProjectSync, path: &Path) -> Result<Vec<SyncOutcome>> {
    if let Some(reason) = sync.skip_reason(path).await {
        return Ok(vec![SyncOutcome::Skipped {
            path: path.to_path_buf(),
            reason,
        }]);
    }
    sync.add_path(path).await
}

async fn changed(sync: &ProjectSync, path: &Path) -> Result<Vec<SyncOutcome>> {
    if let Some(reason) = sync.skip_reason(path).await {
        return Ok(vec![SyncOutcome::Skipped {
            path: path.to_path_buf(),
            reason,
        }]);
    }
    if tokio::fs::try_exists(path).await? {
        return Ok(Vec::new());
    }
    Ok(vec![sync.remove_path(path, false).await?])
}

async fn deleted(
    sync: &ProjectSync,
    batcher: &mut DeletionBatcher,
    path: &Path,
) -> Result<Vec<SyncOutcome>> {
    if !sync.passes_filter(path) {
        return Ok(Vec::new());
    }
    let Some(manifest) = sync.deletion_target(path).await? else {
        return Ok(Vec::new());
    };
    batcher.enqueue(path.to_path_buf(), Some(manifest.clone()), Instant::now());
    Ok(vec![SyncOutcome::Queued {
        path: path.to_path_buf(),
        manifest,
    }])
}

fn failed(sync: &ProjectSync, path: &Path, err: &SyncError) -> SyncOutcome {
    error!("{}: {err}", path.display());
    sync.notifier().error(&err.to_string());
    SyncOutcome::Failed {
        path: path.to_path_buf(),
        error: err.to_string(),
    }
}
