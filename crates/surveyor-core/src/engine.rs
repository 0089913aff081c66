//! The boundary router: admission, tagged dispatch, and reply delivery.
//!
//! Every inbound event passes the rate limiter first, is then resolved
//! into a `RoutedEvent` (admin command or user event) exactly once, and
//! handled exhaustively. Rejections are reported distinctly: a rate-limit
//! denial produces a "slow down" message, never a generic failure, and no
//! in-flight answer is ever dropped without telling its author.

use surveyor_types::config::EngineConfig;
use surveyor_types::error::{EngineError, SessionError};
use surveyor_types::event::{
    AdminCommand, EventPayload, InboundEvent, RoutedEvent, UserEvent,
};
use surveyor_types::identity::{Identity, Role};
use surveyor_types::survey::{SurveyId, SurveyStatus};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use std::sync::Arc;

use crate::broadcast::{self, BroadcastConfig, BroadcastReport};
use crate::gateway::{MessagingGateway, Prompt};
use crate::ratelimit::RateLimiter;
use crate::session::{AnswerOutcome, SessionManager};
use crate::store::SurveyStore;

/// Orchestrates admission control, routing, and session transitions.
pub struct SurveyEngine<S: SurveyStore, G: MessagingGateway + 'static> {
    config: EngineConfig,
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionManager<S>>,
    gateway: Arc<G>,
    broadcast_config: BroadcastConfig,
}

impl<S: SurveyStore, G: MessagingGateway + 'static> SurveyEngine<S, G> {
    pub fn new(
        config: EngineConfig,
        limiter: Arc<RateLimiter>,
        sessions: Arc<SessionManager<S>>,
        gateway: Arc<G>,
    ) -> Self {
        Self {
            config,
            limiter,
            sessions,
            gateway,
            broadcast_config: BroadcastConfig::default(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager<S>> {
        &self.sessions
    }

    /// Handle one inbound event end to end.
    ///
    /// Errors are both reported to the participant through the gateway and
    /// returned typed, so the caller can log or count them.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<(), EngineError> {
        let identity = event.identity;
        let role = self.config.role_of(identity);

        if !self.limiter.admit(identity, role) {
            self.notify_best_effort(identity, "Slow down -- too many requests. Try again in a minute.")
                .await;
            return Err(EngineError::RateLimited);
        }

        let routed = match self.route(identity, role, &event.payload).await? {
            Some(routed) => routed,
            None => return Ok(()),
        };

        match routed {
            RoutedEvent::Admin(command) => self.handle_admin(identity, command).await,
            RoutedEvent::User(user_event) => self.handle_user(identity, user_event).await,
        }
    }

    /// Resolve a raw payload into a routed event, exactly once.
    ///
    /// Returns `Ok(None)` when the event was fully handled here (usage
    /// hints, "nothing in progress" notices).
    async fn route(
        &self,
        identity: Identity,
        role: Role,
        payload: &EventPayload,
    ) -> Result<Option<RoutedEvent>, EngineError> {
        match payload {
            EventPayload::Command { name, arg } => match name.as_str() {
                "start" => {
                    let survey_id = match arg.as_deref().map(Uuid::parse_str) {
                        Some(Ok(id)) => Some(id),
                        Some(Err(_)) => {
                            self.notify_best_effort(identity, "That survey id is not valid.")
                                .await;
                            return Ok(None);
                        }
                        None => self.first_active_survey().await?,
                    };
                    match survey_id {
                        Some(survey_id) => {
                            Ok(Some(RoutedEvent::User(UserEvent::Start { survey_id })))
                        }
                        None => {
                            self.notify_best_effort(identity, "No surveys are open right now.")
                                .await;
                            Ok(None)
                        }
                    }
                }
                "admin" => {
                    if role != Role::Admin {
                        self.notify_best_effort(identity, "You are not an administrator.")
                            .await;
                        return Err(EngineError::NotAuthorized);
                    }
                    self.route_admin(identity, arg.as_deref()).await
                }
                _ => {
                    self.notify_best_effort(
                        identity,
                        "Unknown command. Use /start to begin a survey.",
                    )
                    .await;
                    Ok(None)
                }
            },

            EventPayload::ButtonPress { data } => {
                // Button payloads carry `ans:<index>:<label>`.
                let Some((index, label)) = parse_button_answer(data) else {
                    self.notify_best_effort(identity, "That button is no longer valid.")
                        .await;
                    return Ok(None);
                };
                match self.sessions.current_survey_for(identity) {
                    Some(survey_id) => Ok(Some(RoutedEvent::User(UserEvent::Answer {
                        survey_id,
                        target: Some(index),
                        value: label,
                    }))),
                    None => {
                        self.notify_best_effort(
                            identity,
                            "No survey in progress. Use /start to begin.",
                        )
                        .await;
                        Ok(None)
                    }
                }
            }

            EventPayload::Text { text } => match self.sessions.current_survey_for(identity) {
                Some(survey_id) => Ok(Some(RoutedEvent::User(UserEvent::Answer {
                    survey_id,
                    target: None,
                    value: text.clone(),
                }))),
                None => {
                    self.notify_best_effort(
                        identity,
                        "No survey in progress. Use /start to begin.",
                    )
                    .await;
                    Ok(None)
                }
            },
        }
    }

    async fn route_admin(
        &self,
        identity: Identity,
        arg: Option<&str>,
    ) -> Result<Option<RoutedEvent>, EngineError> {
        const USAGE: &str = "Usage: /admin list | stats <id> | export <id> | broadcast <message>";

        let Some(arg) = arg else {
            self.notify_best_effort(identity, USAGE).await;
            return Ok(None);
        };
        let mut parts = arg.splitn(2, char::is_whitespace);
        let action = parts.next().unwrap_or_default();
        let rest = parts.next().map(str::trim).unwrap_or_default();

        let command = match action {
            "list" => AdminCommand::ListSurveys,
            "stats" | "export" => match Uuid::parse_str(rest) {
                Ok(survey_id) if action == "stats" => AdminCommand::Stats { survey_id },
                Ok(survey_id) => AdminCommand::Export { survey_id },
                Err(_) => {
                    self.notify_best_effort(identity, USAGE).await;
                    return Ok(None);
                }
            },
            "broadcast" if !rest.is_empty() => AdminCommand::Broadcast {
                message: rest.to_string(),
            },
            _ => {
                self.notify_best_effort(identity, USAGE).await;
                return Ok(None);
            }
        };
        Ok(Some(RoutedEvent::Admin(command)))
    }

    async fn handle_user(&self, identity: Identity, event: UserEvent) -> Result<(), EngineError> {
        match event {
            UserEvent::Start { survey_id } => match self.sessions.start(identity, survey_id).await
            {
                Ok(outcome) => {
                    let prompt = Prompt::from_question(&outcome.question);
                    self.send_prompt_best_effort(identity, &prompt).await;
                    Ok(())
                }
                Err(e) => {
                    self.report_session_error(identity, &e).await;
                    Err(e.into())
                }
            },

            UserEvent::Answer {
                survey_id,
                target,
                value,
            } => {
                let result = match target {
                    Some(index) => {
                        self.sessions
                            .answer_at(identity, survey_id, index, &value)
                            .await
                    }
                    None => self.sessions.answer(identity, survey_id, &value).await,
                };
                match result {
                    Ok(AnswerOutcome::Next { question, .. }) => {
                        let prompt = Prompt::from_question(&question);
                        self.send_prompt_best_effort(identity, &prompt).await;
                        Ok(())
                    }
                    Ok(AnswerOutcome::Completed) => {
                        self.notify_best_effort(
                            identity,
                            "That was the last question. Thanks for taking part!",
                        )
                        .await;
                        Ok(())
                    }
                    Ok(AnswerOutcome::Overwritten { index }) => {
                        self.notify_best_effort(
                            identity,
                            &format!("Answer to question {} updated.", index + 1),
                        )
                        .await;
                        Ok(())
                    }
                    Err(e) => {
                        self.report_session_error(identity, &e).await;
                        Err(e.into())
                    }
                }
            }
        }
    }

    async fn handle_admin(
        &self,
        identity: Identity,
        command: AdminCommand,
    ) -> Result<(), EngineError> {
        match command {
            AdminCommand::ListSurveys => {
                let surveys = self.sessions.store().list_surveys().await?;
                let text = if surveys.is_empty() {
                    "No surveys yet.".to_string()
                } else {
                    surveys
                        .iter()
                        .map(|s| format!("{} [{}] {}", s.id, s.status, s.title))
                        .collect::<Vec<_>>()
                        .join("\n")
                };
                self.notify_best_effort(identity, &text).await;
                Ok(())
            }

            AdminCommand::Stats { survey_id } => {
                let store = self.sessions.store();
                let survey = store
                    .get_survey(&survey_id)
                    .await?
                    .ok_or(SessionError::SurveyUnavailable)?;
                let answers = store.answers(&survey_id).await?;
                let respondents = {
                    let mut ids: Vec<_> = answers.iter().map(|a| a.identity).collect();
                    ids.sort();
                    ids.dedup();
                    ids.len()
                };
                let (in_progress, completed, abandoned) =
                    self.sessions.session_counts(&survey_id);
                let text = format!(
                    "{}: {} answers from {} respondents; sessions: {} in progress, {} completed, {} abandoned",
                    survey.title,
                    answers.len(),
                    respondents,
                    in_progress,
                    completed,
                    abandoned
                );
                self.notify_best_effort(identity, &text).await;
                Ok(())
            }

            AdminCommand::Export { survey_id } => {
                let snapshot = self.sessions.store().export_snapshot(&survey_id).await?;
                let text = if snapshot.is_empty() {
                    "No answers recorded yet.".to_string()
                } else {
                    snapshot
                };
                self.notify_best_effort(identity, &text).await;
                Ok(())
            }

            AdminCommand::Broadcast { message } => {
                let report = self.broadcast(message, CancellationToken::new()).await?;
                let text = format!(
                    "Broadcast done: {} sent, {} failed.",
                    report.sent.len(),
                    report.failed.len()
                );
                self.notify_best_effort(identity, &text).await;
                Ok(())
            }
        }
    }

    /// Fan a message out to every identity that has ever answered.
    pub async fn broadcast(
        &self,
        message: String,
        cancel: CancellationToken,
    ) -> Result<BroadcastReport, EngineError> {
        let targets = self.sessions.store().known_identities().await?;
        Ok(broadcast::broadcast(
            self.gateway.clone(),
            message,
            targets,
            self.broadcast_config.clone(),
            cancel,
        )
        .await)
    }

    /// The first active survey, for `/start` without an explicit id.
    async fn first_active_survey(&self) -> Result<Option<SurveyId>, EngineError> {
        let surveys = self.sessions.store().list_surveys().await?;
        Ok(surveys
            .into_iter()
            .find(|s| s.status == SurveyStatus::Active)
            .map(|s| s.id))
    }

    async fn report_session_error(&self, identity: Identity, error: &SessionError) {
        let text = match error {
            SessionError::SurveyUnavailable => "That survey is not available.".to_string(),
            SessionError::AlreadyCompleted => {
                "You have already completed this survey. Thanks again!".to_string()
            }
            SessionError::InvalidAnswer(reason) => format!("That answer won't work: {reason}"),
            SessionError::OutOfOrder { expected, .. } => {
                format!("Please answer question {} first.", expected + 1)
            }
            SessionError::Storage(_) => {
                "Something went wrong saving your answer. Please try again.".to_string()
            }
        };
        self.notify_best_effort(identity, &text).await;
    }

    async fn notify_best_effort(&self, identity: Identity, text: &str) {
        if let Err(e) = self.gateway.notify(identity, text).await {
            warn!(%identity, error = %e, "notification failed");
        }
    }

    async fn send_prompt_best_effort(&self, identity: Identity, prompt: &Prompt) {
        if let Err(e) = self.gateway.send_prompt(identity, prompt).await {
            warn!(%identity, error = %e, "prompt delivery failed");
        }
    }
}

/// Parse `ans:<index>:<label>` button callback data.
fn parse_button_answer(data: &str) -> Option<(u32, String)> {
    let rest = data.strip_prefix("ans:")?;
    let (index, label) = rest.split_once(':')?;
    let index = index.parse().ok()?;
    if label.is_empty() {
        return None;
    }
    Some((index, label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_types::answer::AnswerRecord;
    use surveyor_types::error::{DeliveryError, StoreError};
    use surveyor_types::survey::{Question, Survey};

    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        surveys: Mutex<HashMap<SurveyId, Survey>>,
        answers: Mutex<Vec<AnswerRecord>>,
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
            self.create_survey(survey).await
        }
        async fn delete_survey(&self, id: &SurveyId) -> Result<(), StoreError> {
            self.surveys.lock().unwrap().remove(id);
            Ok(())
        }
        async fn get_survey(&self, id: &SurveyId) -> Result<Option<Survey>, StoreError> {
            Ok(self.surveys.lock().unwrap().get(id).cloned())
        }
        async fn list_surveys(&self) -> Result<Vec<Survey>, StoreError> {
            let mut all: Vec<_> = self.surveys.lock().unwrap().values().cloned().collect();
            all.sort_by_key(|s| s.created_at);
            Ok(all)
        }
        async fn record_answer(&self, record: &AnswerRecord) -> Result<(), StoreError> {
            self.answers.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn answers(&self, id: &SurveyId) -> Result<Vec<AnswerRecord>, StoreError> {
            Ok(self
                .answers
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.survey_id == *id)
                .cloned()
                .collect())
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
        async fn export_snapshot(&self, _id: &SurveyId) -> Result<String, StoreError> {
            Ok(String::new())
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        notices: Mutex<Vec<(Identity, String)>>,
        prompts: Mutex<Vec<(Identity, Prompt)>>,
    }

    impl RecordingGateway {
        fn notices_for(&self, identity: Identity) -> Vec<String> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .filter(|(i, _)| *i == identity)
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    impl MessagingGateway for RecordingGateway {
        async fn send_prompt(
            &self,
            identity: Identity,
            prompt: &Prompt,
        ) -> Result<(), DeliveryError> {
            self.prompts.lock().unwrap().push((identity, prompt.clone()));
            Ok(())
        }
        async fn notify(&self, identity: Identity, text: &str) -> Result<(), DeliveryError> {
            self.notices
                .lock()
                .unwrap()
                .push((identity, text.to_string()));
            Ok(())
        }
    }

    async fn engine_with_survey(
        config: EngineConfig,
    ) -> (
        SurveyEngine<MemStore, RecordingGateway>,
        Arc<RecordingGateway>,
        SurveyId,
    ) {
        let store = Arc::new(MemStore::default());
        let mut survey = Survey::new(
            "Commute habits".to_string(),
            "How people get to work".to_string(),
            vec![
                Question::single_choice(
                    "Do you commute?",
                    vec!["Yes".to_string(), "No".to_string()],
                    false,
                ),
                Question::free_text("Describe it"),
            ],
        );
        survey.status = SurveyStatus::Active;
        let id = survey.id;
        store.create_survey(&survey).await.unwrap();

        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sessions = Arc::new(SessionManager::new(store, config.clone()));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = SurveyEngine::new(config, limiter, sessions, gateway.clone());
        (engine, gateway, id)
    }

    fn text_event(identity: i64, text: &str) -> InboundEvent {
        InboundEvent::new(
            Identity::new(identity),
            InboundEvent::parse_payload(text),
        )
    }

    #[tokio::test]
    async fn start_and_answer_through_the_boundary() {
        let (engine, gateway, _id) = engine_with_survey(EngineConfig::default()).await;
        let user = Identity::new(10);

        engine.handle_event(text_event(10, "/start")).await.unwrap();
        assert_eq!(gateway.prompts.lock().unwrap().len(), 1);

        // Button press answers question 0, advancing to the free-text one.
        engine
            .handle_event(InboundEvent::new(
                user,
                EventPayload::ButtonPress {
                    data: "ans:0:Yes".to_string(),
                },
            ))
            .await
            .unwrap();
        assert_eq!(gateway.prompts.lock().unwrap().len(), 2);

        // Free text answers the last question, completing the survey.
        engine
            .handle_event(text_event(10, "I cycle along the river"))
            .await
            .unwrap();
        let notices = gateway.notices_for(user);
        assert!(notices.iter().any(|n| n.contains("last question")));
    }

    #[tokio::test]
    async fn rate_limited_request_gets_distinct_signal() {
        let (engine, gateway, _id) = engine_with_survey(EngineConfig::default()).await;

        // Use up the budget of 5.
        for _ in 0..5 {
            let _ = engine.handle_event(text_event(10, "/start")).await;
        }
        let err = engine
            .handle_event(text_event(10, "/start"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited));
        let notices = gateway.notices_for(Identity::new(10));
        assert!(notices.iter().any(|n| n.contains("Slow down")));

        // A different identity is still admitted.
        assert!(engine.handle_event(text_event(11, "/start")).await.is_ok());
    }

    #[tokio::test]
    async fn non_admin_is_refused_admin_commands() {
        let (engine, gateway, _id) = engine_with_survey(EngineConfig::default()).await;
        let err = engine
            .handle_event(text_event(10, "/admin list"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized));
        assert!(gateway
            .notices_for(Identity::new(10))
            .iter()
            .any(|n| n.contains("not an administrator")));
    }

    #[tokio::test]
    async fn admin_list_and_stats_round_trip() {
        let config: EngineConfig = {
            let mut c = EngineConfig::default();
            c.admin_ids = vec![1];
            c
        };
        let (engine, gateway, id) = engine_with_survey(config).await;

        engine.handle_event(text_event(1, "/admin list")).await.unwrap();
        let notices = gateway.notices_for(Identity::new(1));
        assert!(notices.iter().any(|n| n.contains("Commute habits")));

        engine
            .handle_event(text_event(1, &format!("/admin stats {id}")))
            .await
            .unwrap();
        let notices = gateway.notices_for(Identity::new(1));
        assert!(notices.iter().any(|n| n.contains("0 answers")));
    }

    #[tokio::test]
    async fn text_without_session_gets_guidance_not_error() {
        let (engine, gateway, _id) = engine_with_survey(EngineConfig::default()).await;
        engine.handle_event(text_event(10, "hello?")).await.unwrap();
        assert!(gateway
            .notices_for(Identity::new(10))
            .iter()
            .any(|n| n.contains("/start")));
    }

    #[tokio::test]
    async fn invalid_option_reports_input_error_and_keeps_state() {
        let (engine, gateway, id) = engine_with_survey(EngineConfig::default()).await;
        let user = Identity::new(10);
        engine.handle_event(text_event(10, "/start")).await.unwrap();

        let err = engine
            .handle_event(text_event(10, "Maybe"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::InvalidAnswer(_))
        ));
        assert!(gateway
            .notices_for(user)
            .iter()
            .any(|n| n.contains("won't work")));

        // Still on question 0: the valid option now succeeds.
        engine.handle_event(text_event(10, "Yes")).await.unwrap();
        let key = surveyor_types::session::SessionKey::new(user, id);
        assert_eq!(engine.sessions().session(&key).unwrap().current_question, 1);
    }

    #[test]
    fn button_payload_parsing() {
        assert_eq!(
            parse_button_answer("ans:2:Walk"),
            Some((2, "Walk".to_string()))
        );
        assert_eq!(parse_button_answer("ans:x:Walk"), None);
        assert_eq!(parse_button_answer("ans:2:"), None);
        assert_eq!(parse_button_answer("other:2:Walk"), None);
    }
}
