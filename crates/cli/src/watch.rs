use crate::report;
use anyhow::{Context as AnyhowContext, Result};
use log::{debug, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use vsproj_sync::{
    in_ignored_scope, FileEvent, FileEventKind, ProjectSync, SyncService, SyncServiceConfig,
};

/// Feed file-system events from `folders` into a [`SyncService`] until Ctrl-C.
pub async fn run(sync: Arc<ProjectSync>, folders: Vec<PathBuf>) -> Result<()> {
    let service = SyncService::start(
        Arc::clone(&sync),
        SyncServiceConfig {
            debounce: sync.config().debounce_delete(),
        },
    );
    let mut updates = service.subscribe_updates();

    let (event_tx, mut event_rx) = mpsc::channel::<notify::Result<Event>>(1024);
    let _watcher = create_fs_watcher(&folders, event_tx)?;
    info!(
        "vsproj#activate: watching {} for *.{} projects",
        folders
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        sync.config().proj_extension
    );

    loop {
        tokio::select! {
            res = event_rx.recv() => {
                let Some(res) = res else { break };
                match res {
                    Ok(event) => {
                        for file_event in classify(&event, &folders) {
                            service.send(file_event).await?;
                        }
                    }
                    Err(err) => warn!("watch error: {err}"),
                }
            }
            update = updates.recv() => match update {
                Ok(outcome) => {
                    if report::is_notable(&outcome) {
                        println!("{}", report::describe(&outcome));
                    } else {
                        debug!("{}", report::describe(&outcome));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("missed {skipped} sync updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, finishing pending removals");
                break;
            }
        }
    }

    service.shutdown().await?;
    Ok(())
}

fn create_fs_watcher(
    folders: &[PathBuf],
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default(),
    )
    .context("watcher init failed")?;
    for folder in folders {
        watcher
            .watch(folder, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", folder.display()))?;
    }
    Ok(watcher)
}

/// Map a raw notify event onto the events the synchronizer understands.
fn classify(event: &Event, folders: &[PathBuf]) -> Vec<FileEvent> {
    let kinds: Vec<(FileEventKind, &PathBuf)> = match event.kind {
        EventKind::Create(_) => tag(FileEventKind::Created, &event.paths),
        EventKind::Remove(_) => tag(FileEventKind::Deleted, &event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            tag(FileEventKind::Deleted, &event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            tag(FileEventKind::Created, &event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![(FileEventKind::Deleted, from), (FileEventKind::Created, to)],
            _ => Vec::new(),
        },
        // The old name is gone when a rename was not paired up.
        EventKind::Modify(ModifyKind::Name(_)) => tag(FileEventKind::Changed, &event.paths),
        EventKind::Modify(ModifyKind::Data(_)) => tag(FileEventKind::Saved, &event.paths),
        EventKind::Modify(_) => tag(FileEventKind::Changed, &event.paths),
        _ => Vec::new(),
    };

    kinds
        .into_iter()
        .filter(|(_, path)| is_watchable(path, folders))
        .map(|(kind, path)| FileEvent::new(kind, path.clone()))
        .collect()
}

fn tag(kind: FileEventKind, paths: &[PathBuf]) -> Vec<(FileEventKind, &PathBuf)> {
    paths.iter().map(|p| (kind, p)).collect()
}

fn is_watchable(path: &Path, folders: &[PathBuf]) -> bool {
    folders
        .iter()
        .find_map(|folder| path.strip_prefix(folder).ok())
        .is_some_and(|relative| !in_ignored_scope(relative))
}

#[cfg(test)]
mod tests {
    use super::classify;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
    use notify::{Event, EventKind};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use vsproj_sync::{FileEvent, FileEventKind};

    fn folders() -> Vec<PathBuf> {
        vec![PathBuf::from("/w")]
    }

    #[test]
    fn rename_pair_becomes_delete_then_create() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/a.js"))
            .add_path(PathBuf::from("/w/b.js"));
        assert_eq!(
            classify(&event, &folders()),
            vec![
                FileEvent::new(FileEventKind::Deleted, "/w/a.js"),
                FileEvent::new(FileEventKind::Created, "/w/b.js"),
            ]
        );
    }

    #[test]
    fn content_write_is_a_save() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/w/a.js"));
        assert_eq!(
            classify(&event, &folders()),
            vec![FileEvent::new(FileEventKind::Saved, "/w/a.js")]
        );
    }

    #[test]
    fn tool_directories_and_outside_paths_are_dropped() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/w/node_modules/x/index.js"))
            .add_path(PathBuf::from("/w/.vsproj/ignore.json"))
            .add_path(PathBuf::from("/elsewhere/a.js"));
        assert!(classify(&event, &folders()).is_empty());

        let event = Event::new(EventKind::Remove(RemoveKind::Any)).add_path(PathBuf::from("/w/a"));
        assert_eq!(
            classify(&event, &folders()),
            vec![FileEvent::new(FileEventKind::Deleted, "/w/a")]
        );
    }
}
