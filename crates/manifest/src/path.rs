//! Manifest-relative path identifiers.
//!
//! Manifests always store `\`-separated paths relative to the directory holding
//! the manifest file, whatever the host separator is.

use std::path::{Component, Path, PathBuf};

/// Separator used inside `Include` attributes.
pub const MANIFEST_SEPARATOR: char = '\\';

/// Path of `target` relative to the directory containing `manifest`, with `\`
/// separators.
///
/// With `treat_as_folder`, a target that has no extension and is not a dot-file
/// gets a trailing `\` so folder entries can be told apart from extension-less
/// files.
#[must_use]
pub fn relative_to(manifest: &Path, target: &Path, treat_as_folder: bool) -> String {
    let base = normalize_lexically(manifest.parent().unwrap_or_else(|| Path::new("")));
    let target_norm = normalize_lexically(target);

    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target_norm.components().collect();
    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::new();
    for part in &base_parts[common..] {
        if matches!(part, Component::Normal(_) | Component::ParentDir) {
            segments.push("..".to_string());
        }
    }
    for part in &target_parts[common..] {
        match part {
            Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
            Component::ParentDir => segments.push("..".to_string()),
            _ => {}
        }
    }

    let mut relative = segments.join("\\").replace('/', "\\");
    if treat_as_folder && is_folder_like(target) {
        relative.push(MANIFEST_SEPARATOR);
    }
    relative
}

/// `true` when the path has no extension and its name does not start with `.`.
///
/// This is how a path is classified once it no longer exists on disk. It is an
/// approximation: an extension-less regular file such as `LICENSE` is also
/// reported as a folder.
#[must_use]
pub fn is_folder_like(path: &Path) -> bool {
    if path.extension().is_some() {
        return false;
    }
    path.file_name()
        .map(|name| !name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Resolve `.` and `..` without touching the file system.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against the current working directory.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_lexically(path));
    }
    let cwd = std::env::current_dir()?;
    Ok(normalize_lexically(&cwd.join(path)))
}
