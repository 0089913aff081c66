//! Console transport for local runs.
//!
//! Outbound messages print to stdout; inbound events are read from stdin,
//! one per line, as `<identity> <text>`. The text half goes through the
//! normal payload parser, so `/start`, `/admin ...`, and plain answers all
//! work exactly as they would over a chat transport.

use surveyor_core::gateway::{EventSource, MessagingGateway, Prompt};
use surveyor_types::error::DeliveryError;
use surveyor_types::event::InboundEvent;
use surveyor_types::identity::Identity;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

/// Prints prompts and notifications to stdout.
pub struct ConsoleGateway;

impl MessagingGateway for ConsoleGateway {
    async fn send_prompt(&self, identity: Identity, prompt: &Prompt) -> Result<(), DeliveryError> {
        println!("-> {identity}: {}", prompt.text);
        for (i, option) in prompt.options.iter().enumerate() {
            println!("     [{i}] {option}");
        }
        if !prompt.options.is_empty() && prompt.allow_custom {
            println!("     (or type your own answer)");
        }
        Ok(())
    }

    async fn notify(&self, identity: Identity, text: &str) -> Result<(), DeliveryError> {
        println!("-> {identity}: {text}");
        Ok(())
    }
}

/// Reads `<identity> <text>` lines from any buffered reader.
///
/// Malformed lines are logged and skipped; end of input ends the stream.
pub struct LineEventSource<R> {
    lines: Lines<R>,
}

impl LineEventSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> EventSource for LineEventSource<R> {
    async fn next_event(&mut self) -> Option<InboundEvent> {
        loop {
            let line = self.lines.next_line().await.ok()??;
            match parse_line(&line) {
                Some(event) => return Some(event),
                None => {
                    if !line.trim().is_empty() {
                        warn!(line, "unparseable input line skipped");
                    }
                }
            }
        }
    }
}

/// Parse one `<identity> <text>` input line.
fn parse_line(line: &str) -> Option<InboundEvent> {
    let trimmed = line.trim();
    let (identity, text) = trimmed.split_once(char::is_whitespace)?;
    let identity: i64 = identity.parse().ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(InboundEvent::new(
        Identity::new(identity),
        InboundEvent::parse_payload(text),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_types::event::EventPayload;

    #[test]
    fn test_parse_command_line() {
        let event = parse_line("42 /start").unwrap();
        assert_eq!(event.identity, Identity::new(42));
        assert_eq!(
            event.payload,
            EventPayload::Command {
                name: "start".to_string(),
                arg: None,
            }
        );
    }

    #[test]
    fn test_parse_text_line() {
        let event = parse_line("7 I cycle to work").unwrap();
        assert_eq!(event.identity, Identity::new(7));
        assert_eq!(
            event.payload,
            EventPayload::Text {
                text: "I cycle to work".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert!(parse_line("").is_none());
        assert!(parse_line("justtext").is_none());
        assert!(parse_line("notanumber hello").is_none());
        assert!(parse_line("42").is_none());
        assert!(parse_line("42   ").is_none());
    }

    #[tokio::test]
    async fn test_source_skips_garbage_and_ends_on_eof() {
        let input = "garbage\n42 /start\n\n7 an answer\n";
        let mut source = LineEventSource::new(BufReader::new(input.as_bytes()));

        assert_eq!(
            source.next_event().await.unwrap().identity,
            Identity::new(42)
        );
        assert_eq!(source.next_event().await.unwrap().identity, Identity::new(7));
        assert!(source.next_event().await.is_none());
    }
}
