use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Paths the user asked never to be added, persisted to `.vsproj/ignore.json`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    file: Option<PathBuf>,
    paths: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IgnoreFile {
    #[serde(default)]
    ignore_paths: Vec<String>,
}

#[must_use]
pub fn ignore_file_path(workspace: &Path) -> PathBuf {
    workspace.join(".vsproj").join("ignore.json")
}

impl IgnoreList {
    /// In-memory list that is never written anywhere.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub async fn load(file: PathBuf) -> Result<Self> {
        let paths = match fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice::<IgnoreFile>(&bytes)?.ignore_paths,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            file: Some(file),
            paths,
        })
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        let key = path.to_string_lossy();
        self.paths.iter().any(|p| *p == key)
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub async fn add(&mut self, path: &Path) -> Result<()> {
        if self.contains(path) {
            return Ok(());
        }
        self.paths.push(path.to_string_lossy().into_owned());
        self.save().await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.paths.clear();
        self.save().await
    }

    async fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(&IgnoreFile {
            ignore_paths: self.paths.clone(),
        })?;
        fs::write(file, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ignore_file_path, IgnoreList};
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::tempdir;

    #[tokio::test]
    async fn survives_reload_and_clear() {
        let temp = tempdir().unwrap();
        let file = ignore_file_path(temp.path());

        let mut list = IgnoreList::load(file.clone()).await.unwrap();
        assert!(list.paths().is_empty());
        list.add(Path::new("/w/a.js")).await.unwrap();
        list.add(Path::new("/w/a.js")).await.unwrap();

        let mut reloaded = IgnoreList::load(file.clone()).await.unwrap();
        assert_eq!(reloaded.paths(), ["/w/a.js".to_string()]);
        assert!(reloaded.contains(Path::new("/w/a.js")));

        reloaded.clear().await.unwrap();
        let cleared = IgnoreList::load(file).await.unwrap();
        assert!(cleared.paths().is_empty());
    }
}
