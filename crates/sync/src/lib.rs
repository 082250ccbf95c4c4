//! # vsproj sync
//!
//! Turns file-system events into edits of the owning project manifest.
//!
//! ## Flow
//!
//! ```text
//! FileEvent (saved / created / changed / deleted)
//!     │
//!     ├──> PathFilter + IgnoreList
//!     │
//!     ├──> saved / created ──> ProjectSync::add_path
//!     │                          └─> locate, membership check, insert, persist
//!     │
//!     └──> deleted ──> DeletionBatcher (quiescence window)
//!                        └─> ProjectSync::remove_pending (re-validate, remove, persist)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vsproj_manifest::{ManifestCache, WorkspaceRoots};
//! use vsproj_sync::{
//!     FileEvent, FileEventKind, IgnoreList, ProjectSync, SyncConfig, SyncService,
//!     SyncServiceConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> vsproj_sync::Result<()> {
//!     let config = SyncConfig::default();
//!     let roots = WorkspaceRoots::from_workspace_folders(["/work/app"])?;
//!     let sync = ProjectSync::new(
//!         config,
//!         Arc::new(ManifestCache::new()),
//!         roots,
//!         IgnoreList::ephemeral(),
//!     )?;
//!     let service = SyncService::start(Arc::new(sync), SyncServiceConfig::default());
//!
//!     service
//!         .send(FileEvent::new(FileEventKind::Created, "/work/app/src/new.js"))
//!         .await?;
//!     service.shutdown().await
//! }
//! ```

mod batcher;
mod config;
mod error;
mod ignore_list;
mod scanner;
mod service;
mod sync;

pub use batcher::{BatchState, DeletionBatcher, PendingRemoval, DEFAULT_QUIESCENCE};
pub use config::{
    config_path_for_workspace, ItemTypeConfig, PathFilter, SyncConfig, CONFIG_FILE_NAME,
    DEFAULT_CATEGORY, FOLDER_CATEGORY,
};
pub use error::{Result, SyncError};
pub use ignore_list::{ignore_file_path, IgnoreList};
pub use scanner::{in_ignored_scope, FolderScanner};
pub use service::{FileEvent, FileEventKind, SyncService, SyncServiceConfig};
pub use sync::{
    AcceptAll, AddDecision, AddPrompt, LogNotifier, Notifier, ProjectSync, SkipReason,
    SyncOutcome,
};
