//! Survey store port.
//!
//! Defines the interface for durable survey and answer persistence.
//! Implementations live in surveyor-infra. Durability contract: every
//! mutating operation is atomic with respect to process crash -- a write is
//! either fully visible or not visible at all.

use surveyor_types::answer::AnswerRecord;
use surveyor_types::error::StoreError;
use surveyor_types::identity::Identity;
use surveyor_types::survey::{Survey, SurveyId};

/// Trait for durable survey definition and answer storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in surveyor-infra.
///
/// Concurrency contract: writers to the same survey's answer set are
/// serialized by the implementation (per-resource locking, never a single
/// global lock), so concurrent `record_answer` calls for different
/// identities can never corrupt or lose each other's records.
pub trait SurveyStore: Send + Sync {
    /// Persist a new survey definition.
    ///
    /// Fails with `StoreError::SurveyLimitReached` when the configured
    /// maximum number of surveys already exists.
    fn create_survey(
        &self,
        survey: &Survey,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Replace an existing survey definition.
    ///
    /// Fails with `StoreError::Conflict` if the question sequence differs
    /// from the stored one and at least one answer has been recorded --
    /// answer/question alignment must be preserved.
    fn update_survey(
        &self,
        survey: &Survey,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a survey definition and its answer set.
    fn delete_survey(
        &self,
        id: &SurveyId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Fetch a survey by id. Returns None if it does not exist.
    fn get_survey(
        &self,
        id: &SurveyId,
    ) -> impl std::future::Future<Output = Result<Option<Survey>, StoreError>> + Send;

    /// List all surveys, ordered by creation time.
    fn list_surveys(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Survey>, StoreError>> + Send;

    /// Append or overwrite one answer record.
    ///
    /// The record is keyed by (identity, question index) within the
    /// survey's answer set; writing the same key again replaces the value.
    fn record_answer(
        &self,
        record: &AnswerRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Read all answers for a survey, sorted by (identity, question index).
    fn answers(
        &self,
        id: &SurveyId,
    ) -> impl std::future::Future<Output = Result<Vec<AnswerRecord>, StoreError>> + Send;

    /// All identities that have ever recorded an answer, deduplicated
    /// and sorted. This is the broadcast target set.
    fn known_identities(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Identity>, StoreError>> + Send;

    /// Render a point-in-time, internally consistent snapshot of a
    /// survey's answers as tab-delimited UTF-8 text, one line per answer:
    /// `identity \t question_index \t value`.
    ///
    /// Two exports with no intervening writes yield byte-identical output.
    fn export_snapshot(
        &self,
        id: &SurveyId,
    ) -> impl std::future::Future<Output = Result<String, StoreError>> + Send;
}
