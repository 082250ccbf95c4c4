use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Lists the files under a directory that was added as a whole.
pub struct FolderScanner {
    root: PathBuf,
}

impl FolderScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Every file below the root, in walk order (.gitignore aware).
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::debug!("Found {} files under {}", files.len(), self.root.display());
        files
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        path.strip_prefix(root).is_ok_and(in_ignored_scope)
    }
}

/// `relative` runs through a tool or VCS directory that never belongs in a
/// project (`node_modules`, `.git`, ...).
#[must_use]
pub fn in_ignored_scope(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let lowered = name.to_string_lossy().to_lowercase();
            IGNORED_SCOPES.iter().any(|ignored| *ignored == lowered)
        }
        _ => false,
    })
}

const IGNORED_SCOPES: &[&str] = &["node_modules", ".git", ".hg", ".svn", ".vs", ".vsproj"];

#[cfg(test)]
mod tests {
    use super::{in_ignored_scope, FolderScanner};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn skips_node_modules_and_keeps_dot_files() {
        let temp = tempdir().unwrap();
        let modules = temp.path().join("node_modules").join("left-pad");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("index.js"), b"").unwrap();
        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("lib").join("b.js"), b"").unwrap();
        fs::write(temp.path().join("a.js"), b"").unwrap();
        fs::write(temp.path().join(".eslintrc"), b"{}").unwrap();

        let files = FolderScanner::new(temp.path()).scan();
        let names: Vec<_> = files
            .iter()
            .map(|p| {
                p.strip_prefix(temp.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec![".eslintrc", "a.js", "lib/b.js"]);
    }

    #[test]
    fn ignored_scope_matches_any_component() {
        assert!(in_ignored_scope(Path::new("app/node_modules/x/index.js")));
        assert!(in_ignored_scope(Path::new(".vsproj/ignore.json")));
        assert!(!in_ignored_scope(Path::new("app/modules/index.js")));
    }
}
