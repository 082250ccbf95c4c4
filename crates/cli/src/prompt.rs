use dialoguer::Select;
use std::path::Path;
use tokio::runtime::{Handle, RuntimeFlavor};
use vsproj_sync::{AddDecision, AddPrompt};

const CHOICES: [&str; 3] = ["Yes", "Not now", "Never for this file"];

/// Asks on the terminal: yes, not now, or never.
pub struct TerminalPrompt;

impl AddPrompt for TerminalPrompt {
    fn decide(&self, path: &Path, manifest_name: &str) -> AddDecision {
        let file = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let picked = off_runtime(|| {
            Select::new()
                .with_prompt(format!("Add {file} to {manifest_name}?"))
                .items(&CHOICES)
                .default(0)
                .interact_opt()
        });
        match picked {
            Ok(choice) => decision_for(choice),
            Err(err) => {
                log::warn!("cannot prompt for {file}: {err}");
                AddDecision::Decline
            }
        }
    }
}

/// Run a blocking terminal read without stalling the other tasks on this
/// worker. `block_in_place` is only available on the multi-threaded runtime.
fn off_runtime<T>(read: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

/// Escape or an unreadable terminal counts as "not now".
fn decision_for(choice: Option<usize>) -> AddDecision {
    match choice {
        Some(0) => AddDecision::Accept,
        Some(2) => AddDecision::Suppress,
        _ => AddDecision::Decline,
    }
}
