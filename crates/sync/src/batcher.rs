//! Debounced collection of deletion events.
//!
//! A burst of deletions (deleting a folder reports every file inside it) is
//! gathered until no new deletion has arrived for the quiescence window, then
//! handed over as one batch.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(2_000);

/// A deleted path waiting for its batch, with the manifest that listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRemoval {
    pub path: PathBuf,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Collecting { deadline: Instant },
}

#[derive(Debug)]
pub struct DeletionBatcher {
    window: Duration,
    queue: Vec<PendingRemoval>,
    state: BatchState,
}

impl DeletionBatcher {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            queue: Vec::new(),
            state: BatchState::Idle,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.state
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_pending(&self, path: &Path) -> bool {
        self.queue.iter().any(|p| p.path == path)
    }

    /// Queue `path` and push the deadline out to `now + window`.
    ///
    /// A path already waiting keeps its place in the queue.
    pub fn enqueue(&mut self, path: PathBuf, manifest: Option<PathBuf>, now: Instant) {
        if !self.is_pending(&path) {
            self.queue.push(PendingRemoval { path, manifest });
        }
        self.state = BatchState::Collecting {
            deadline: now + self.window,
        };
    }

    /// Pull `path` back out, e.g. because it was re-created.
    pub fn cancel(&mut self, path: &Path) -> bool {
        let before = self.queue.len();
        self.queue.retain(|p| p.path != path);
        let removed = self.queue.len() != before;
        if self.queue.is_empty() {
            self.state = BatchState::Idle;
        }
        removed
    }

    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            BatchState::Idle => None,
            BatchState::Collecting { deadline } => Some(deadline),
        }
    }

    /// The whole queue, once `now` has reached the deadline.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<PendingRemoval>> {
        match self.state {
            BatchState::Collecting { deadline } if now >= deadline => Some(self.drain()),
            _ => None,
        }
    }

    /// The whole queue regardless of the deadline.
    pub fn drain(&mut self) -> Vec<PendingRemoval> {
        self.state = BatchState::Idle;
        std::mem::take(&mut self.queue)
    }
}

impl Default for DeletionBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_QUIESCENCE)
    }
}
