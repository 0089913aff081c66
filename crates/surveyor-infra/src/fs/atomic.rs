//! Crash-safe file replacement.
//!
//! Writes stage into a temp file in the destination directory, fsync it,
//! then rename over the destination. Readers either see the old complete
//! content or the new complete content, never a torn write. A crash
//! between stage and rename leaves a `.tmp`-suffixed stray that directory
//! scans skip and the next sweep removes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Atomically replace `path` with `content`.
///
/// The parent directory is created if missing. Blocking I/O runs on the
/// blocking pool.
pub async fn write_atomic(path: &Path, content: String) -> std::io::Result<()> {
    let path: PathBuf = path.to_owned();
    tokio::task::spawn_blocking(move || write_atomic_sync(&path, &content))
        .await
        .map_err(std::io::Error::other)?
}

fn write_atomic_sync(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("destination has no parent directory"))?;
    std::fs::create_dir_all(parent)?;

    let mut staged = NamedTempFile::with_suffix_in(".tmp", parent)?;
    staged.write_all(content.as_bytes())?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");

        write_atomic(&path, "{\"v\":1}".to_string()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"v\":1}");
    }

    #[tokio::test]
    async fn test_replace_leaves_no_partial_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.json");

        write_atomic(&path, "old".to_string()).await.unwrap();
        write_atomic(&path, "new".to_string()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        // The staging temp file is gone after a successful rename.
        let strays: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(strays, vec![std::ffi::OsString::from("file.json")]);
    }
}
