//! Pure transition rules for the per-pair state machine.
//!
//! Kept free of locks and I/O so every rule is directly testable:
//! which question index an answer may target, and where the cursor goes
//! after a successful persist.

use surveyor_types::config::ReanswerPolicy;
use surveyor_types::error::SessionError;
use surveyor_types::survey::Survey;

/// Where an accepted answer lands relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSlot {
    /// The current question: the cursor advances after persist.
    Current,
    /// An earlier, already-answered question: the value is overwritten
    /// and the cursor does not move.
    Earlier,
}

/// Decide whether an answer may target `target` given the cursor position.
///
/// Skipping ahead is always rejected. Answers below the cursor are allowed
/// only under `ReanswerPolicy::Overwrite`.
pub fn classify_target(
    current: u32,
    target: u32,
    policy: ReanswerPolicy,
) -> Result<AnswerSlot, SessionError> {
    if target == current {
        return Ok(AnswerSlot::Current);
    }
    if target > current {
        return Err(SessionError::OutOfOrder {
            expected: current,
            got: target,
        });
    }
    match policy {
        ReanswerPolicy::Overwrite => Ok(AnswerSlot::Earlier),
        ReanswerPolicy::Reject => Err(SessionError::OutOfOrder {
            expected: current,
            got: target,
        }),
    }
}

/// Cursor movement after the current question was answered and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More questions remain; the cursor moves to this index.
    Advanced(u32),
    /// The last question was answered; the session completes.
    Finished,
}

/// Compute where the cursor goes after answering `answered`.
pub fn progress_after(survey: &Survey, answered: u32) -> Progress {
    match survey.last_question_index() {
        Some(last) if answered < last => Progress::Advanced(answered + 1),
        _ => Progress::Finished,
    }
}
