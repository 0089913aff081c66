//! Inbound events and the tagged dispatch resolved at the boundary.
//!
//! The engine receives raw `InboundEvent`s from the transport, resolves
//! the sender's role once, and routes the event as a `RoutedEvent` with
//! exhaustive handling -- admin commands and user events never share a
//! code path past the boundary.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::survey::SurveyId;

/// What a participant sent: a command, a button press, or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A slash command, e.g. `/start` or `/admin` (leading slash stripped).
    Command { name: String, arg: Option<String> },
    /// A button press carrying opaque callback data.
    ButtonPress { data: String },
    /// Plain text, usually a free-text answer.
    Text { text: String },
}

/// A raw inbound event, before role resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub identity: Identity,
    pub payload: EventPayload,
}

impl InboundEvent {
    pub fn new(identity: Identity, payload: EventPayload) -> Self {
        Self { identity, payload }
    }

    /// Parse a line of text into an event payload.
    ///
    /// Lines starting with `/` become commands (`/start`, `/admin list`);
    /// everything else is free text.
    pub fn parse_payload(text: &str) -> EventPayload {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix('/') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_string();
            let arg = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            EventPayload::Command { name, arg }
        } else {
            EventPayload::Text {
                text: trimmed.to_string(),
            }
        }
    }
}

/// A user-side event: participating in a survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// `/start` -- begin (or resume) the given survey.
    Start { survey_id: SurveyId },
    /// An answer to a question of an in-progress survey. `target` is the
    /// question index a button press carries; `None` means the current
    /// question (plain text answers).
    Answer {
        survey_id: SurveyId,
        target: Option<u32>,
        value: String,
    },
}

/// An admin-side event: survey management and bulk operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    ListSurveys,
    Stats { survey_id: SurveyId },
    Export { survey_id: SurveyId },
    Broadcast { message: String },
}

/// The boundary dispatch: role resolved exactly once, handled exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedEvent {
    Admin(AdminCommand),
    User(UserEvent),
}
