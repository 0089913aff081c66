//! Export artifact directory.
//!
//! Snapshots rendered by the store are written here as
//! `survey_data_{survey_id}_{timestamp}.txt` and deleted again by the
//! cleanup sweep once they outlive the retention window.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use surveyor_core::cleanup::ArtifactSweeper;
use surveyor_types::survey::SurveyId;
use tracing::debug;

use super::atomic::write_atomic;

const ARTIFACT_PREFIX: &str = "survey_data_";

/// Owns the `exports/` directory.
pub struct ExportDir {
    dir: PathBuf,
}

impl ExportDir {
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write one snapshot artifact; returns its path.
    pub async fn write_artifact(
        &self,
        survey_id: &SurveyId,
        snapshot: String,
    ) -> std::io::Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let path = self
            .dir
            .join(format!("{ARTIFACT_PREFIX}{survey_id}_{stamp}.txt"));
        write_atomic(&path, snapshot).await?;
        Ok(path)
    }
}

impl ArtifactSweeper for ExportDir {
    async fn sweep_expired(&self, retention: Duration) -> std::io::Result<usize> {
        let now = std::time::SystemTime::now();
        let mut deleted = 0;

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_artifact = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX));
            if !is_artifact {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            let expired = now
                .duration_since(modified)
                .map(|age| age > retention)
                .unwrap_or(false);
            if expired {
                tokio::fs::remove_file(&path).await?;
                debug!(path = %path.display(), "expired export removed");
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_artifact_name_carries_prefix_and_survey_id() {
        let dir = tempdir().unwrap();
        let exports = ExportDir::open(dir.path()).await.unwrap();
        let id = uuid::Uuid::now_v7();

        let path = exports
            .write_artifact(&id, "1\t0\tyes\n".to_string())
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(&format!("survey_data_{id}_")));
        assert!(name.ends_with(".txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1\t0\tyes\n");
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_artifacts() {
        let dir = tempdir().unwrap();
        let exports = ExportDir::open(dir.path()).await.unwrap();
        let old = exports
            .write_artifact(&uuid::Uuid::now_v7(), "old".to_string())
            .await
            .unwrap();
        let fresh = exports
            .write_artifact(&uuid::Uuid::now_v7(), "fresh".to_string())
            .await
            .unwrap();
        // Unrelated files are never touched.
        let other = dir.path().join("notes.txt");
        std::fs::write(&other, "keep me").unwrap();

        // Backdate the first artifact past the retention window.
        let past = std::time::SystemTime::now() - Duration::from_secs(48 * 3600);
        let file = std::fs::File::options().append(true).open(&old).unwrap();
        file.set_modified(past).unwrap();
        drop(file);

        let deleted = exports
            .sweep_expired(Duration::from_secs(24 * 3600))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(other.exists());
    }

    #[tokio::test]
    async fn test_sweep_of_empty_dir_is_noop() {
        let dir = tempdir().unwrap();
        let exports = ExportDir::open(dir.path()).await.unwrap();
        assert_eq!(
            exports.sweep_expired(Duration::from_secs(60)).await.unwrap(),
            0
        );
    }
}
