//! Messaging gateway port.
//!
//! The chat transport (message delivery, button rendering, webhook or
//! long-poll plumbing) is an external collaborator. The engine only needs
//! two outbound operations and one inbound event sequence; everything else
//! about the wire protocol stays behind this boundary.

use surveyor_types::error::DeliveryError;
use surveyor_types::event::InboundEvent;
use surveyor_types::identity::Identity;
use surveyor_types::survey::{Question, QuestionKind};

/// A rendered question or menu, ready for the transport to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// Option labels to render as buttons (empty for free-text questions).
    pub options: Vec<String>,
    /// Whether a free-typed answer is accepted alongside the options.
    pub allow_custom: bool,
}

impl Prompt {
    /// Build a prompt from a survey question.
    pub fn from_question(question: &Question) -> Self {
        match &question.kind {
            QuestionKind::SingleChoice {
                options,
                allow_custom,
            } => Self {
                text: question.prompt.clone(),
                options: options.clone(),
                allow_custom: *allow_custom,
            },
            QuestionKind::FreeText => Self {
                text: question.prompt.clone(),
                options: Vec::new(),
                allow_custom: true,
            },
        }
    }
}

/// Outbound operations the engine performs against the chat transport.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live outside the core.
pub trait MessagingGateway: Send + Sync {
    /// Deliver the next question (or a menu) to a participant.
    fn send_prompt(
        &self,
        identity: Identity,
        prompt: &Prompt,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;

    /// Deliver a plain text notification to a participant.
    fn notify(
        &self,
        identity: Identity,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

/// Inbound side of the transport: a lazy, unbounded, non-restartable
/// sequence of events. `None` means the transport has shut down.
pub trait EventSource: Send {
    fn next_event(
        &mut self,
    ) -> impl std::future::Future<Output = Option<InboundEvent>> + Send;
}
