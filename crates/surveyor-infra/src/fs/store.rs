//! File-backed survey store.
//!
//! One JSON document per survey under `surveys/`, one JSON answer set per
//! survey under `answers/`. Answer sets are `BTreeMap`s keyed by the
//! zero-padded `(identity, question_index)` key, so serialization order --
//! and therefore export output -- is deterministic.
//!
//! Writers to the same file are serialized through a per-path lock table;
//! different surveys never contend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use surveyor_core::locks::LockTable;
use surveyor_core::store::SurveyStore;
use surveyor_types::answer::AnswerRecord;
use surveyor_types::config::ContentLimits;
use surveyor_types::error::StoreError;
use surveyor_types::identity::Identity;
use surveyor_types::survey::{Survey, SurveyId};
use tracing::warn;

use super::atomic::write_atomic;
use super::DataLayout;

type AnswerSet = BTreeMap<String, AnswerRecord>;

/// Crash-safe JSON file store for surveys and answers.
pub struct FsSurveyStore {
    layout: DataLayout,
    max_surveys: usize,
    locks: LockTable<PathBuf>,
}

impl FsSurveyStore {
    /// Open the store, creating the directory layout if missing.
    pub async fn open(layout: DataLayout, limits: &ContentLimits) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(layout.surveys_dir()).await?;
        tokio::fs::create_dir_all(layout.answers_dir()).await?;
        Ok(Self {
            layout,
            max_surveys: limits.max_surveys,
            locks: LockTable::new(),
        })
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let rendered = serde_json::to_string_pretty(value)?;
        write_atomic(path, rendered).await?;
        Ok(())
    }

    async fn load_answer_set(&self, id: &SurveyId) -> Result<AnswerSet, StoreError> {
        Ok(Self::read_json(&self.layout.answers_path(id))
            .await?
            .unwrap_or_default())
    }

    /// Paths of survey documents currently on disk. Staging temp files and
    /// anything else without a `.json` extension are skipped.
    async fn survey_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(self.layout.surveys_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl SurveyStore for FsSurveyStore {
    async fn create_survey(&self, survey: &Survey) -> Result<(), StoreError> {
        let path = self.layout.survey_path(&survey.id);
        // Creation checks a store-wide invariant (the survey cap), so all
        // creates serialize on the surveys directory, not the new path.
        let lock = self.locks.lock_for(&self.layout.surveys_dir());
        let _guard = lock.lock().await;

        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::Conflict(format!(
                "survey {} already exists",
                survey.id
            )));
        }
        if self.survey_paths().await?.len() >= self.max_surveys {
            return Err(StoreError::SurveyLimitReached(self.max_surveys));
        }
        Self::write_json(&path, survey).await
    }

    async fn update_survey(&self, survey: &Survey) -> Result<(), StoreError> {
        let path = self.layout.survey_path(&survey.id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.lock().await;

        let existing: Survey = Self::read_json(&path).await?.ok_or(StoreError::NotFound)?;
        if existing.questions != survey.questions {
            let answers = self.load_answer_set(&survey.id).await?;
            if !answers.is_empty() {
                return Err(StoreError::Conflict(
                    "questions cannot change once answers exist".to_string(),
                ));
            }
        }
        Self::write_json(&path, survey).await
    }

    async fn delete_survey(&self, id: &SurveyId) -> Result<(), StoreError> {
        let path = self.layout.survey_path(id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.lock().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound);
            }
            Err(e) => return Err(e.into()),
        }
        // The answer set may not exist; that is not an error.
        match tokio::fs::remove_file(self.layout.answers_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
        Self::read_json(&self.layout.survey_path(id)).await
    }

    async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
        let mut surveys = Vec::new();
        for path in self.survey_paths().await? {
            match Self::read_json::<Survey>(&path).await {
                Ok(Some(survey)) => surveys.push(survey),
                Ok(None) => {}
                Err(e) => {
                    // One unreadable document must not hide the rest.
                    warn!(path = %path.display(), error = %e, "skipping unreadable survey");
                }
            }
        }
        surveys.sort_by_key(|s| (s.created_at, s.id));
        Ok(surveys)
    }

    async fn record_answer(&self, record: &AnswerRecord) -> Result<(), StoreError> {
        let path = self.layout.answers_path(&record.survey_id);
        let lock = self.locks.lock_for(&path);
        let _guard = lock.lock().await;

        let mut answers: AnswerSet = Self::read_json(&path).await?.unwrap_or_default();
        answers.insert(record.set_key(), record.clone());
        Self::write_json(&path, &answers).await
    }

    async fn answers(&self, id: &SurveyId) -> Result<Vec<AnswerRecord>, StoreError> {
        let answers = self.load_answer_set(id).await?;
        Ok(answers.into_values().collect())
    }

    async fn known_identities(&self) -> Result<Vec<Identity>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(self.layout.answers_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match Self::read_json::<AnswerSet>(&path).await {
                Ok(Some(answers)) => ids.extend(answers.values().map(|a| a.identity)),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable answer set");
                }
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn export_snapshot(&self, id: &SurveyId) -> Result<String, StoreError> {
        let answers = self.load_answer_set(id).await?;
        let mut out = String::new();
        for record in answers.values() {
            out.push_str(&record.export_line());
        }
        Ok(out)
    }
}
