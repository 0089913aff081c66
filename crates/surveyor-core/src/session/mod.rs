//! Per (identity, survey) session state machine and its manager.

pub mod machine;
pub mod manager;

pub use machine::{AnswerSlot, Progress};
pub use manager::{AnswerOutcome, SessionManager, StartOutcome};
