use crate::{ManifestError, Result};
use fs2::FileExt;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace the contents of `path` with `bytes`.
///
/// Runs as one blocking task holding an exclusive lock on the file so two
/// writers never interleave. A read-only flag left by another tool is cleared
/// first.
pub(crate) async fn write_manifest(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        use std::fs::OpenOptions;

        clear_readonly(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive().map_err(|err| {
            ManifestError::Other(format!("lock manifest {}: {err}", path.display()))
        })?;

        let result = (|| -> std::io::Result<()> {
            file.set_len(0)?;
            file.write_all(&bytes)?;
            file.sync_all()
        })();
        let _ = FileExt::unlock(&file);
        result?;

        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    })
    .await
    .map_err(|err| ManifestError::Other(format!("join manifest write task: {err}")))?
}

fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
    }
    std::fs::set_permissions(path, perms)
}

#[cfg(all(test, unix))]
mod tests {
    use super::write_manifest;
    use tempfile::tempdir;

    #[tokio::test]
    async fn overwrites_read_only_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app.njsproj");
        std::fs::write(&path, "<Project>old and longer content</Project>").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        write_manifest(&path, b"<Project />".to_vec()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<Project />");
        assert!(!std::fs::metadata(&path).unwrap().permissions().readonly());
    }
}
