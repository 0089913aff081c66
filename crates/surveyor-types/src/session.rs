//! Per-user, per-survey progress state.
//!
//! A `SurveySession` tracks one identity's position within one survey.
//! Sessions live in memory only: losing them after a crash resets a user
//! to the start of their current survey, never touching recorded answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::identity::Identity;
use crate::survey::SurveyId;

/// Key for the session table and its lock table: one session may exist
/// per (identity, survey) pair at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub identity: Identity,
    pub survey_id: SurveyId,
}

impl SessionKey {
    pub fn new(identity: Identity, survey_id: SurveyId) -> Self {
        Self {
            identity,
            survey_id,
        }
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// One identity's in-progress position within one survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveySession {
    pub key: SessionKey,
    /// Index of the question the user is currently being asked.
    pub current_question: u32,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl SurveySession {
    /// Start a fresh session at question 0.
    pub fn start(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            current_question: 0,
            started_at: now,
            last_activity_at: now,
            status: SessionStatus::InProgress,
        }
    }

    /// Record activity, refreshing the staleness clock.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Advance to the next question.
    pub fn advance(&mut self) {
        self.current_question += 1;
        self.touch();
    }

    /// Mark the session completed.
    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.touch();
    }

    /// Mark the session abandoned (cleanup transition for stale sessions).
    pub fn abandon(&mut self) {
        self.status = SessionStatus::Abandoned;
    }
}
