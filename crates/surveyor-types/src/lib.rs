//! Shared domain types for Surveyor.
//!
//! This crate contains the core domain types used across the survey engine:
//! Identity, Survey, Question, Session, AnswerRecord, and their associated
//! error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod answer;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod session;
pub mod survey;
