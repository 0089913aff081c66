//! Session manager: owns the per-pair progress table and drives transitions.
//!
//! Generic over `SurveyStore` so the core never depends on the concrete
//! storage (clean architecture, surveyor-core never sees surveyor-infra).
//! Every transition for a given (identity, survey) pair runs under that
//! pair's lock; pairs never contend with each other.
//!
//! Ordering invariant: the answer is persisted through the store *before*
//! the in-memory cursor moves. A failed persist therefore leaves the
//! session exactly where it was, and the error surfaces to the caller.

use chrono::Utc;
use dashmap::DashMap;
use surveyor_types::answer::AnswerRecord;
use surveyor_types::config::EngineConfig;
use surveyor_types::config::ReentryPolicy;
use surveyor_types::error::SessionError;
use surveyor_types::identity::Identity;
use surveyor_types::session::{SessionKey, SessionStatus, SurveySession};
use surveyor_types::survey::{Question, Survey, SurveyId, SurveyStatus};
use tracing::{debug, info};

use std::sync::Arc;
use std::time::Duration;

use crate::locks::LockTable;
use crate::session::machine::{self, AnswerSlot, Progress};
use crate::store::SurveyStore;
use crate::validate;

/// Result of starting (or resuming) a survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub question: Question,
    pub question_index: u32,
    /// True when an in-progress session was resumed rather than created.
    pub resumed: bool,
}

/// Result of a successfully persisted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The cursor advanced; this is the next question to prompt.
    Next { question: Question, index: u32 },
    /// The last question was answered; the session is completed.
    Completed,
    /// An earlier answer was overwritten; the cursor did not move.
    Overwritten { index: u32 },
}

/// Owns the in-memory session table and serializes per-pair transitions.
pub struct SessionManager<S: SurveyStore> {
    store: Arc<S>,
    config: EngineConfig,
    sessions: DashMap<SessionKey, SurveySession>,
    locks: LockTable<SessionKey>,
}

impl<S: SurveyStore> SessionManager<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            sessions: DashMap::new(),
            locks: LockTable::new(),
        }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Load a survey and require it to be active.
    async fn active_survey(&self, survey_id: &SurveyId) -> Result<Survey, SessionError> {
        let survey = self
            .store
            .get_survey(survey_id)
            .await?
            .ok_or(SessionError::SurveyUnavailable)?;
        if survey.status != SurveyStatus::Active {
            return Err(SessionError::SurveyUnavailable);
        }
        Ok(survey)
    }

    /// Start a survey for an identity, or resume an in-progress session.
    ///
    /// A completed session is handled per `ReentryPolicy`: `Reject`
    /// reports `AlreadyCompleted`, `Restart` discards it and starts over.
    /// An abandoned session always restarts.
    pub async fn start(
        &self,
        identity: Identity,
        survey_id: SurveyId,
    ) -> Result<StartOutcome, SessionError> {
        let key = SessionKey::new(identity, survey_id);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let survey = self.active_survey(&survey_id).await?;
        let existing = self.sessions.get(&key).map(|e| e.clone());

        match existing {
            Some(mut session) if session.status == SessionStatus::InProgress => {
                let question = survey
                    .question(session.current_question)
                    .ok_or(SessionError::SurveyUnavailable)?
                    .clone();
                let index = session.current_question;
                session.touch();
                self.sessions.insert(key, session);
                debug!(%identity, %survey_id, question = index, "session resumed");
                Ok(StartOutcome {
                    question,
                    question_index: index,
                    resumed: true,
                })
            }
            Some(session)
                if session.status == SessionStatus::Completed
                    && self.config.reentry_policy == ReentryPolicy::Reject =>
            {
                Err(SessionError::AlreadyCompleted)
            }
            _ => {
                // No session, an abandoned one, or a completed one under
                // the restart policy: begin at question 0.
                let question = survey
                    .question(0)
                    .ok_or(SessionError::SurveyUnavailable)?
                    .clone();
                self.sessions.insert(key, SurveySession::start(key));
                info!(%identity, %survey_id, "session started");
                Ok(StartOutcome {
                    question,
                    question_index: 0,
                    resumed: false,
                })
            }
        }
    }

    /// Answer the current question of an in-progress session.
    pub async fn answer(
        &self,
        identity: Identity,
        survey_id: SurveyId,
        raw: &str,
    ) -> Result<AnswerOutcome, SessionError> {
        self.submit(identity, survey_id, None, raw).await
    }

    /// Answer a specific question index (button presses carry the index).
    ///
    /// Skipping ahead of the cursor is rejected; answering below it
    /// follows the configured `ReanswerPolicy`.
    pub async fn answer_at(
        &self,
        identity: Identity,
        survey_id: SurveyId,
        target: u32,
        raw: &str,
    ) -> Result<AnswerOutcome, SessionError> {
        self.submit(identity, survey_id, Some(target), raw).await
    }

    async fn submit(
        &self,
        identity: Identity,
        survey_id: SurveyId,
        target: Option<u32>,
        raw: &str,
    ) -> Result<AnswerOutcome, SessionError> {
        let key = SessionKey::new(identity, survey_id);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let mut session = match self.sessions.get(&key).map(|e| e.clone()) {
            Some(s) if s.status == SessionStatus::InProgress => s,
            Some(s) if s.status == SessionStatus::Completed => {
                return Err(SessionError::AlreadyCompleted);
            }
            _ => return Err(SessionError::SurveyUnavailable),
        };

        let survey = self.active_survey(&survey_id).await?;
        let target = target.unwrap_or(session.current_question);
        let slot = machine::classify_target(
            session.current_question,
            target,
            self.config.reanswer_policy,
        )?;
        let question = survey
            .question(target)
            .ok_or(SessionError::SurveyUnavailable)?;
        let value = validate::validate_answer(question, raw, &self.config.limits)?;

        // Persist before any state change; a failure here must leave the
        // session untouched.
        let record = AnswerRecord::new(identity, survey_id, target, value);
        self.store.record_answer(&record).await?;

        match slot {
            AnswerSlot::Earlier => {
                session.touch();
                self.sessions.insert(key, session);
                debug!(%identity, %survey_id, question = target, "answer overwritten");
                Ok(AnswerOutcome::Overwritten { index: target })
            }
            AnswerSlot::Current => match machine::progress_after(&survey, target) {
                Progress::Advanced(next) => {
                    let next_question = survey
                        .question(next)
                        .ok_or(SessionError::SurveyUnavailable)?
                        .clone();
                    session.advance();
                    self.sessions.insert(key, session);
                    Ok(AnswerOutcome::Next {
                        question: next_question,
                        index: next,
                    })
                }
                Progress::Finished => {
                    session.complete();
                    self.sessions.insert(key, session);
                    info!(%identity, %survey_id, "session completed");
                    Ok(AnswerOutcome::Completed)
                }
            },
        }
    }

    /// The survey an identity is currently answering, if any.
    pub fn current_survey_for(&self, identity: Identity) -> Option<SurveyId> {
        self.sessions
            .iter()
            .filter(|e| e.key().identity == identity && e.status == SessionStatus::InProgress)
            .map(|e| e.key().survey_id)
            .next()
    }

    /// Snapshot of one session.
    pub fn session(&self, key: &SessionKey) -> Option<SurveySession> {
        self.sessions.get(key).map(|e| e.clone())
    }

    /// Counts of (in-progress, completed, abandoned) sessions for a survey.
    pub fn session_counts(&self, survey_id: &SurveyId) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for entry in self.sessions.iter() {
            if entry.key().survey_id != *survey_id {
                continue;
            }
            match entry.status {
                SessionStatus::InProgress => counts.0 += 1,
                SessionStatus::Completed => counts.1 += 1,
                SessionStatus::Abandoned => counts.2 += 1,
            }
        }
        counts
    }

    /// Mark in-progress sessions idle longer than `threshold` as abandoned.
    ///
    /// Keys are snapshotted first; each candidate is then re-checked under
    /// its own pair lock so the sweep never races an active transition.
    pub async fn abandon_stale(&self, threshold: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());

        let candidates: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|e| e.status == SessionStatus::InProgress && e.last_activity_at < cutoff)
            .map(|e| *e.key())
            .collect();

        let mut abandoned = 0;
        for key in candidates {
            let lock = self.locks.lock_for(&key);
            let _guard = lock.lock().await;
            let Some(mut session) = self.sessions.get(&key).map(|e| e.clone()) else {
                continue;
            };
            if session.status == SessionStatus::InProgress && session.last_activity_at < cutoff {
                session.abandon();
                self.sessions.insert(key, session);
                abandoned += 1;
                info!(identity = %key.identity, survey_id = %key.survey_id, "session abandoned");
            }
        }
        abandoned
    }

    /// Drop completed and abandoned sessions idle longer than `retention`,
    /// along with their lock-table entries.
    ///
    /// Without this the session and lock tables would grow by one entry
    /// per (identity, survey) pair for the life of the process.
    pub async fn evict_finished(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());

        let candidates: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|e| e.status != SessionStatus::InProgress && e.last_activity_at < cutoff)
            .map(|e| *e.key())
            .collect();

        let mut evicted = 0;
        for key in candidates {
            let lock = self.locks.lock_for(&key);
            {
                let _guard = lock.lock().await;
                let dead = self
                    .sessions
                    .get(&key)
                    .is_some_and(|s| s.status != SessionStatus::InProgress && s.last_activity_at < cutoff);
                if dead {
                    self.sessions.remove(&key);
                    evicted += 1;
                    debug!(identity = %key.identity, survey_id = %key.survey_id, "session evicted");
                }
            }
            drop(lock);
            self.locks.release(&key);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_types::config::{ReanswerPolicy, ReentryPolicy};
    use surveyor_types::error::StoreError;
    use surveyor_types::survey::Question;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory store double with a switchable write failure.
    #[derive(Default)]
    struct MemStore {
        surveys: Mutex<HashMap<SurveyId, Survey>>,
        answers: Mutex<Vec<AnswerRecord>>,
        fail_writes: AtomicBool,
    }

    impl MemStore {
        fn with_survey(survey: Survey) -> (Arc<Self>, SurveyId) {
            let id = survey.id;
            let store = Arc::new(Self::default());
            store.surveys.lock().unwrap().insert(id, survey);
            (store, id)
        }

        fn recorded(&self) -> Vec<AnswerRecord> {
            self.answers.lock().unwrap().clone()
        }
    }

    impl SurveyStore for MemStore {
        async fn create_survey(&self, survey: &Survey) -> Result<(), StoreError> {
            self.surveys
                .lock()
                .unwrap()
                .insert(survey.id, survey.clone());
            Ok(())
        }

        async fn update_survey(&self, survey: &Survey) -> Result<(), StoreError> {
            self.surveys
                .lock()
                .unwrap()
                .insert(survey.id, survey.clone());
            Ok(())
        }

        async fn delete_survey(&self, id: &SurveyId) -> Result<(), StoreError> {
            self.surveys.lock().unwrap().remove(id);
            Ok(())
        }

        async fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
            Ok(self.surveys.lock().unwrap().get(id).cloned())
        }

        async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
            Ok(self.surveys.lock().unwrap().values().cloned().collect())
        }

        async fn record_answer(&self, record: &AnswerRecord) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            let mut answers = self.answers.lock().unwrap();
            answers.retain(|a| {
                !(a.identity == record.identity
                    && a.survey_id == record.survey_id
                    && a.question_index == record.question_index)
            });
            answers.push(record.clone());
            Ok(())
        }

        async fn answers(&self, id: &SurveyId) -> Result<Vec<AnswerRecord>, StoreError> {
            let mut out: Vec<_> = self
                .answers
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.survey_id == *id)
                .cloned()
                .collect();
            out.sort_by_key(|a| (a.identity, a.question_index));
            Ok(out)
        }

        async fn known_identities(&self) -> Result<Vec<Identity>, StoreError> {
            let mut ids: Vec<_> = self
                .answers
                .lock()
                .unwrap()
                .iter()
                .map(|a| a.identity)
                .collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }

        async fn export_snapshot(&self, id: &SurveyId) -> Result<String, StoreError> {
            let mut out = String::new();
            for a in self.answers(id).await? {
                out.push_str(&a.export_line());
            }
            Ok(out)
        }
    }

    fn active_survey(questions: usize) -> Survey {
        let mut survey = Survey::new(
            "Commute habits".to_string(),
            "How people get to work".to_string(),
            (0..questions)
                .map(|i| Question::free_text(format!("q{i}")))
                .collect(),
        );
        survey.status = SurveyStatus::Active;
        survey
    }

    fn manager_with(
        survey: Survey,
        config: EngineConfig,
    ) -> (SessionManager<MemStore>, Arc<MemStore>, SurveyId) {
        let (store, id) = MemStore::with_survey(survey);
        (SessionManager::new(store.clone(), config), store, id)
    }

    #[tokio::test]
    async fn full_flow_to_completion() {
        let (mgr, store, id) = manager_with(active_survey(2), EngineConfig::default());
        let user = Identity::new(1);

        let started = mgr.start(user, id).await.unwrap();
        assert_eq!(started.question_index, 0);
        assert!(!started.resumed);

        let outcome = mgr.answer(user, id, "by bike").await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Next { index: 1, .. }));

        let outcome = mgr.answer(user, id, "20 minutes").await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Completed);

        let key = SessionKey::new(user, id);
        assert_eq!(mgr.session(&key).unwrap().status, SessionStatus::Completed);
        assert_eq!(store.recorded().len(), 2);
    }

    #[tokio::test]
    async fn skipping_ahead_is_rejected() {
        let (mgr, store, id) = manager_with(active_survey(3), EngineConfig::default());
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();

        let err = mgr.answer_at(user, id, 2, "nope").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::OutOfOrder {
                expected: 0,
                got: 2
            }
        ));
        // Nothing was persisted and the cursor did not move.
        assert!(store.recorded().is_empty());
        let key = SessionKey::new(user, id);
        assert_eq!(mgr.session(&key).unwrap().current_question, 0);
    }

    #[tokio::test]
    async fn inactive_survey_is_unavailable() {
        let (mgr, _store, id) = manager_with(active_survey(1), EngineConfig::default());
        // Close the survey behind the manager's back.
        let mgr_store = mgr.store().clone();
        let mut survey = mgr_store.get_survey(&id).await.unwrap().unwrap();
        survey.status = SurveyStatus::Closed;
        mgr_store.update_survey(&survey).await.unwrap();

        let err = mgr.start(Identity::new(1), id).await.unwrap_err();
        assert!(matches!(err, SessionError::SurveyUnavailable));
    }

    #[tokio::test]
    async fn reentry_reject_reports_already_completed() {
        let (mgr, _store, id) = manager_with(active_survey(1), EngineConfig::default());
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();
        mgr.answer(user, id, "done").await.unwrap();

        let err = mgr.start(user, id).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyCompleted));
    }

    #[tokio::test]
    async fn reentry_restart_begins_fresh_session() {
        let config = EngineConfig {
            reentry_policy: ReentryPolicy::Restart,
            ..Default::default()
        };
        let (mgr, _store, id) = manager_with(active_survey(1), config);
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();
        mgr.answer(user, id, "first run").await.unwrap();

        let restarted = mgr.start(user, id).await.unwrap();
        assert_eq!(restarted.question_index, 0);
        assert!(!restarted.resumed);
        let key = SessionKey::new(user, id);
        assert_eq!(mgr.session(&key).unwrap().status, SessionStatus::InProgress);
    }

    #[tokio::test]
    async fn reanswer_overwrite_replaces_value_without_moving_cursor() {
        let (mgr, store, id) = manager_with(active_survey(3), EngineConfig::default());
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();
        mgr.answer(user, id, "car").await.unwrap();
        mgr.answer(user, id, "30 min").await.unwrap();

        let outcome = mgr.answer_at(user, id, 0, "bike").await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Overwritten { index: 0 });

        let recorded = store.recorded();
        let q0 = recorded.iter().find(|a| a.question_index == 0).unwrap();
        assert_eq!(q0.value, "bike");
        let key = SessionKey::new(user, id);
        assert_eq!(mgr.session(&key).unwrap().current_question, 2);
    }

    #[tokio::test]
    async fn reanswer_reject_refuses_earlier_question() {
        let config = EngineConfig {
            reanswer_policy: ReanswerPolicy::Reject,
            ..Default::default()
        };
        let (mgr, _store, id) = manager_with(active_survey(3), config);
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();
        mgr.answer(user, id, "car").await.unwrap();

        let err = mgr.answer_at(user, id, 0, "bike").await.unwrap_err();
        assert!(matches!(err, SessionError::OutOfOrder { .. }));
    }

    #[tokio::test]
    async fn completed_session_accepts_no_writes_under_either_policy() {
        for policy in [ReanswerPolicy::Overwrite, ReanswerPolicy::Reject] {
            let config = EngineConfig {
                reanswer_policy: policy,
                ..Default::default()
            };
            let (mgr, _store, id) = manager_with(active_survey(1), config);
            let user = Identity::new(1);
            mgr.start(user, id).await.unwrap();
            mgr.answer(user, id, "done").await.unwrap();

            let err = mgr.answer_at(user, id, 0, "again").await.unwrap_err();
            assert!(matches!(err, SessionError::AlreadyCompleted));
        }
    }

    #[tokio::test]
    async fn failed_persist_leaves_session_unchanged() {
        let (mgr, store, id) = manager_with(active_survey(2), EngineConfig::default());
        let user = Identity::new(1);
        mgr.start(user, id).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = mgr.answer(user, id, "lost?").await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(StoreError::Io(_))));

        let key = SessionKey::new(user, id);
        assert_eq!(mgr.session(&key).unwrap().current_question, 0);
        assert!(store.recorded().is_empty());

        // Recovery: the same answer succeeds once the store is healthy.
        store.fail_writes.store(false, Ordering::SeqCst);
        let outcome = mgr.answer(user, id, "recovered").await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Next { index: 1, .. }));
    }

    #[tokio::test]
    async fn concurrent_identities_lose_no_answers() {
        let (mgr, store, id) = manager_with(active_survey(1), EngineConfig::default());
        let mgr = Arc::new(mgr);

        let mut handles = Vec::new();
        for i in 1..=8i64 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move {
                let user = Identity::new(i);
                mgr.start(user, id).await.unwrap();
                mgr.answer(user, id, &format!("answer from {i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let recorded = store.recorded();
        assert_eq!(recorded.len(), 8);
        for i in 1..=8i64 {
            assert!(recorded
                .iter()
                .any(|a| a.identity == Identity::new(i)
                    && a.value == format!("answer from {i}")));
        }
    }

    #[tokio::test]
    async fn answer_without_session_is_unavailable() {
        let (mgr, _store, id) = manager_with(active_survey(1), EngineConfig::default());
        let err = mgr.answer(Identity::new(1), id, "hi").await.unwrap_err();
        assert!(matches!(err, SessionError::SurveyUnavailable));
    }

    #[tokio::test]
    async fn abandon_stale_only_touches_idle_sessions() {
        let (mgr, _store, id) = manager_with(active_survey(2), EngineConfig::default());
        let fresh = Identity::new(1);
        let idle = Identity::new(2);
        mgr.start(fresh, id).await.unwrap();
        mgr.start(idle, id).await.unwrap();

        // Backdate the idle session's activity clock.
        let idle_key = SessionKey::new(idle, id);
        let mut session = mgr.session(&idle_key).unwrap();
        session.last_activity_at = Utc::now() - chrono::Duration::hours(48);
        mgr.sessions.insert(idle_key, session);

        let abandoned = mgr.abandon_stale(Duration::from_secs(86_400)).await;
        assert_eq!(abandoned, 1);
        assert_eq!(
            mgr.session(&idle_key).unwrap().status,
            SessionStatus::Abandoned
        );
        assert_eq!(
            mgr.session(&SessionKey::new(fresh, id)).unwrap().status,
            SessionStatus::InProgress
        );
        assert_eq!(mgr.session_counts(&id), (1, 0, 1));
    }

    #[tokio::test]
    async fn evict_finished_drops_dead_sessions_and_their_locks() {
        let (mgr, _store, id) = manager_with(active_survey(1), EngineConfig::default());
        let done = Identity::new(1);
        let live = Identity::new(2);
        mgr.start(done, id).await.unwrap();
        mgr.answer(done, id, "finished").await.unwrap();
        mgr.start(live, id).await.unwrap();
        assert_eq!(mgr.locks.len(), 2);

        // Backdate the completed session past the retention window.
        let done_key = SessionKey::new(done, id);
        let mut session = mgr.session(&done_key).unwrap();
        session.last_activity_at = Utc::now() - chrono::Duration::days(30);
        mgr.sessions.insert(done_key, session);

        let evicted = mgr.evict_finished(Duration::from_secs(604_800)).await;
        assert_eq!(evicted, 1);
        assert!(mgr.session(&done_key).is_none());
        assert_eq!(mgr.locks.len(), 1);

        // The fresh in-progress session is untouched.
        assert_eq!(
            mgr.session(&SessionKey::new(live, id)).unwrap().status,
            SessionStatus::InProgress
        );

        // A recently completed session is kept for stats until it ages out.
        mgr.answer(live, id, "also finished").await.unwrap();
        let again = mgr.evict_finished(Duration::from_secs(604_800)).await;
        assert_eq!(again, 0);
        assert_eq!(
            mgr.session(&SessionKey::new(live, id)).unwrap().status,
            SessionStatus::Completed
        );
    }
}
