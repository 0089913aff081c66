//! Answer records: the durable facts of the system.
//!
//! One `AnswerRecord` is one identity's response to one question. Records
//! are keyed by `(identity, question_index)` within a survey's answer set,
//! so a re-answer under the overwrite policy replaces the prior value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::survey::SurveyId;

/// One identity's response to one question of one survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub identity: Identity,
    pub survey_id: SurveyId,
    pub question_index: u32,
    /// Selected option label or sanitized free text.
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

impl AnswerRecord {
    pub fn new(
        identity: Identity,
        survey_id: SurveyId,
        question_index: u32,
        value: String,
    ) -> Self {
        Self {
            identity,
            survey_id,
            question_index,
            value,
            recorded_at: Utc::now(),
        }
    }

    /// Key of this record within its survey's answer set.
    ///
    /// The `{identity}:{question_index}` format sorts identities and
    /// indices stably inside a `BTreeMap`, which is what makes repeated
    /// exports byte-identical.
    pub fn set_key(&self) -> String {
        answer_set_key(self.identity, self.question_index)
    }

    /// Render this record as one tab-delimited export line:
    /// `identity \t question_index \t value \n`.
    ///
    /// Backslashes, tabs, and newlines inside the value are escaped as
    /// `\\`, `\t`, and `\n`, so every record occupies exactly one line
    /// with exactly three fields regardless of what the user typed.
    pub fn export_line(&self) -> String {
        format!(
            "{}\t{}\t{}\n",
            self.identity,
            self.question_index,
            escape_export_value(&self.value)
        )
    }
}

fn escape_export_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Answer-set key for an (identity, question index) pair.
///
/// The identity is offset-encoded onto `u64` before zero-padding, so
/// lexicographic order matches numeric order even for negative chat ids.
pub fn answer_set_key(identity: Identity, question_index: u32) -> String {
    let ordered = (identity.as_i64() as u64) ^ (1 << 63);
    format!("{ordered:020}:{question_index:04}")
}
