use std::path::Path;
use vsproj_sync::{SkipReason, SyncOutcome};

/// One line of human-readable output per outcome.
pub fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Added { path, manifest } => {
            format!("added {} to {}", path.display(), name(manifest))
        }
        SyncOutcome::AlreadyListed { path, manifest } => {
            format!("{} is already in {}", path.display(), name(manifest))
        }
        SyncOutcome::Removed { path, manifest } => {
            format!("removed {} from {}", path.display(), name(manifest))
        }
        SyncOutcome::NotListed { path, manifest } => {
            format!("{} is not in {}", path.display(), name(manifest))
        }
        SyncOutcome::Declined { path } => format!("left out {}", path.display()),
        SyncOutcome::Suppressed { path } => format!("ignoring {} from now on", path.display()),
        SyncOutcome::Skipped { path, reason } => {
            let why = match reason {
                SkipReason::Filtered => "filtered out",
                SkipReason::Ignored => "on the ignore list",
                SkipReason::NotAProjectFile => "not a project file",
            };
            format!("skipped {} ({why})", path.display())
        }
        SyncOutcome::NoManifest { path } => format!("no project found for {}", path.display()),
        SyncOutcome::Queued { path, .. } => format!("queued removal of {}", path.display()),
        SyncOutcome::Cancelled { path } => {
            format!("kept {} (re-created before removal)", path.display())
        }
        SyncOutcome::Invalidated { manifest } => format!("reloading {}", name(manifest)),
        SyncOutcome::Failed { path, error } => format!("failed {}: {error}", path.display()),
    }
}

/// Outcomes worth printing while watching; the rest go to the debug log.
pub const fn is_notable(outcome: &SyncOutcome) -> bool {
    matches!(
        outcome,
        SyncOutcome::Added { .. }
            | SyncOutcome::Removed { .. }
            | SyncOutcome::Suppressed { .. }
            | SyncOutcome::Failed { .. }
    )
}

fn name(manifest: &Path) -> String {
    manifest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::{describe, is_notable};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use vsproj_sync::{SkipReason, SyncOutcome};

    #[test]
    fn names_manifest_by_file_name() {
        let outcome = SyncOutcome::Added {
            path: PathBuf::from("/w/app/a.js"),
            manifest: PathBuf::from("/w/app/app.njsproj"),
        };
        assert_eq!(describe(&outcome), "added /w/app/a.js to app.njsproj");
        assert!(is_notable(&outcome));
    }

    #[test]
    fn skip_reason_is_spelled_out() {
        let outcome = SyncOutcome::Skipped {
            path: PathBuf::from("/w/a.map"),
            reason: SkipReason::Filtered,
        };
        assert_eq!(describe(&outcome), "skipped /w/a.map (filtered out)");
        assert!(!is_notable(&outcome));
    }
}
