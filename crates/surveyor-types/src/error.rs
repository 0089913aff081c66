//! Error taxonomy for the survey engine.
//!
//! Four families, matching how failures must surface: input errors go back
//! to the user with state unchanged, admission errors carry a distinct
//! "slow down" signal, storage errors bubble typed and unchanged, and
//! delivery errors are recorded per-target without failing a batch.

use thiserror::Error;

/// Errors from the survey store.
///
/// Every failed persist attempt surfaces one of these; the engine never
/// silently drops a write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("survey not found")]
    NotFound,

    #[error("survey limit reached ({0} max)")]
    SurveyLimitReached(usize),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from session transitions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The survey does not exist or is not active.
    #[error("survey unavailable")]
    SurveyUnavailable,

    /// The answer failed kind validation; session state unchanged.
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),

    /// Answering a question other than the current one.
    #[error("out of order: expected question {expected}, got {got}")]
    OutOfOrder { expected: u32, got: u32 },

    /// Completed session re-entered under `ReentryPolicy::Reject`.
    #[error("survey already completed")]
    AlreadyCompleted,

    /// The underlying persist failed; the session was not advanced.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Outcome of a single gateway delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Worth retrying with backoff (network hiccup, flood control).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Not worth retrying (blocked bot, unknown chat).
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

/// Top-level engine error, tagged by family for the caller's UI.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rate limit exceeded -- show "slow down", not a generic failure.
    #[error("rate limited")]
    RateLimited,

    #[error("not authorized")]
    NotAuthorized,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
