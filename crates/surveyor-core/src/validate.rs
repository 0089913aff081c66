//! Input sanitization and content validation.
//!
//! Free-typed values pass through `sanitize` before they are persisted:
//! control characters are stripped (newline and tab survive) and the
//! result is capped at the configured answer length. Survey content is
//! checked against `ContentLimits` at authoring time.

use surveyor_types::config::ContentLimits;
use surveyor_types::error::SessionError;
use surveyor_types::survey::{Question, QuestionKind, Survey};

/// Strip control characters (keeping `\n` and `\t`), trim, and cap length.
pub fn sanitize(text: &str, max_len: usize) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    cleaned.trim().chars().take(max_len).collect()
}

/// Whether a trimmed text's length falls within `min..=max`.
pub fn text_length_ok(text: &str, min: usize, max: usize) -> bool {
    let len = text.trim().chars().count();
    min <= len && len <= max
}

/// Validate a raw answer value against a question's kind.
///
/// Single-choice answers must match an option label exactly unless the
/// question allows a custom answer; free-text and custom answers are
/// sanitized and length-bounded. Returns the value to persist.
pub fn validate_answer(
    question: &Question,
    raw: &str,
    limits: &ContentLimits,
) -> Result<String, SessionError> {
    match &question.kind {
        QuestionKind::SingleChoice {
            options,
            allow_custom,
        } => {
            if options.iter().any(|o| o == raw) {
                return Ok(raw.to_string());
            }
            if !allow_custom {
                return Err(SessionError::InvalidAnswer(format!(
                    "'{raw}' is not one of the offered options"
                )));
            }
            sanitize_free_value(raw, limits)
        }
        QuestionKind::FreeText => sanitize_free_value(raw, limits),
    }
}

fn sanitize_free_value(raw: &str, limits: &ContentLimits) -> Result<String, SessionError> {
    let value = sanitize(raw, limits.max_answer_len);
    if value.is_empty() {
        return Err(SessionError::InvalidAnswer(
            "answer is empty after sanitization".to_string(),
        ));
    }
    Ok(value)
}

/// Validate a survey's content bounds at authoring time.
pub fn validate_survey(survey: &Survey, limits: &ContentLimits) -> Result<(), String> {
    if !text_length_ok(&survey.title, limits.min_title_len, limits.max_title_len) {
        return Err(format!(
            "title must be {}..={} characters",
            limits.min_title_len, limits.max_title_len
        ));
    }
    if !text_length_ok(
        &survey.description,
        limits.min_description_len,
        limits.max_description_len,
    ) {
        return Err(format!(
            "description must be {}..={} characters",
            limits.min_description_len, limits.max_description_len
        ));
    }
    let count = survey.questions.len();
    if count < limits.min_questions || count > limits.max_questions {
        return Err(format!(
            "survey must have {}..={} questions",
            limits.min_questions, limits.max_questions
        ));
    }
    for (i, question) in survey.questions.iter().enumerate() {
        if question.prompt.trim().is_empty() {
            return Err(format!("question {i} has an empty prompt"));
        }
        if let QuestionKind::SingleChoice { options, .. } = &question.kind {
            if options.is_empty() {
                return Err(format!("question {i} has no options"));
            }
            if options.iter().any(|o| o.trim().is_empty()) {
                return Err(format!("question {i} has an empty option label"));
            }
        }
    }
    Ok(())
}
