//! Survey and question types.
//!
//! A `Survey` is an ordered sequence of questions plus metadata, authored
//! by an admin. The question sequence is immutable once any answer has been
//! recorded against it (enforced by the store, which rejects such edits
//! with a structural-conflict error).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique survey identifier (UUID v7, time-sortable).
pub type SurveyId = Uuid;

/// Lifecycle status of a survey.
///
/// Only `Active` surveys accept new sessions; `Draft` surveys are still
/// being authored and `Closed` surveys keep their answers readable for
/// stats and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Active,
    Closed,
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyStatus::Draft => write!(f, "draft"),
            SurveyStatus::Active => write!(f, "active"),
            SurveyStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for SurveyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(SurveyStatus::Draft),
            "active" => Ok(SurveyStatus::Active),
            "closed" => Ok(SurveyStatus::Closed),
            other => Err(format!("invalid survey status: '{other}'")),
        }
    }
}

impl Default for SurveyStatus {
    fn default() -> Self {
        SurveyStatus::Draft
    }
}

/// What kind of answer a question accepts.
///
/// `SingleChoice` questions carry an ordered option set; `allow_custom`
/// additionally accepts a free-typed answer outside the option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice {
        options: Vec<String>,
        #[serde(default)]
        allow_custom: bool,
    },
    FreeText,
}

/// One question within a survey.
///
/// The question's index is its position in `Survey::questions`; it is
/// stable once the survey has been published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// A free-text question with the given prompt.
    pub fn free_text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: QuestionKind::FreeText,
        }
    }

    /// A single-choice question with the given option labels.
    pub fn single_choice(
        prompt: impl Into<String>,
        options: Vec<String>,
        allow_custom: bool,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            kind: QuestionKind::SingleChoice {
                options,
                allow_custom,
            },
        }
    }
}

/// An admin-authored survey: metadata plus an ordered question sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub status: SurveyStatus,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    /// Create a new draft survey with a fresh time-sortable id.
    pub fn new(title: String, description: String, questions: Vec<Question>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title,
            description,
            questions,
            status: SurveyStatus::Draft,
            created_at: Utc::now(),
        }
    }

    /// Index of the last question, if any questions exist.
    pub fn last_question_index(&self) -> Option<u32> {
        if self.questions.is_empty() {
            None
        } else {
            Some((self.questions.len() - 1) as u32)
        }
    }

    /// Look up a question by index.
    pub fn question(&self, index: u32) -> Option<&Question> {
        self.questions.get(index as usize)
    }
}
