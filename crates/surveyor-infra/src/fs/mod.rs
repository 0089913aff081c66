//! Filesystem storage for Surveyor.
//!
//! On-disk layout under the data directory:
//! ```text
//! {data_dir}/
//!   config.toml
//!   surveys/{survey_id}.json
//!   answers/{survey_id}.json
//!   exports/survey_data_{survey_id}_{timestamp}.txt
//! ```
//! Every write goes through [`atomic::write_atomic`], so a crash mid-write
//! leaves at most a stale temp file that readers ignore.

pub mod atomic;
pub mod export;
pub mod store;

use std::path::{Path, PathBuf};

use anyhow::Context;
use surveyor_types::config::EngineConfig;
use surveyor_types::survey::SurveyId;

/// Path helpers for the data directory layout.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn surveys_dir(&self) -> PathBuf {
        self.root.join("surveys")
    }

    pub fn answers_dir(&self) -> PathBuf {
        self.root.join("answers")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn survey_path(&self, id: &SurveyId) -> PathBuf {
        self.surveys_dir().join(format!("{id}.json"))
    }

    pub fn answers_path(&self, id: &SurveyId) -> PathBuf {
        self.answers_dir().join(format!("{id}.json"))
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `SURVEYOR_DATA_DIR` environment variable
/// 2. `~/.surveyor`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SURVEYOR_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".surveyor");
    }

    // Last resort: current directory
    PathBuf::from(".surveyor")
}

/// Load engine configuration from `config.toml`, falling back to defaults
/// when the file does not exist.
pub async fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("invalid config at {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(e) => Err(e).with_context(|| format!("reading config at {}", path.display())),
    }
}
