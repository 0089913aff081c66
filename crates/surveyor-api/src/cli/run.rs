//! Interactive engine loop on the console transport.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use surveyor_core::cleanup::CleanupScheduler;
use surveyor_core::engine::SurveyEngine;
use surveyor_core::gateway::EventSource;
use surveyor_infra::console::{ConsoleGateway, LineEventSource};

use crate::state::AppState;

/// Run the engine until stdin closes or Ctrl+C.
pub async fn run(state: AppState) -> Result<()> {
    let engine = SurveyEngine::new(
        state.config.clone(),
        state.limiter.clone(),
        state.sessions.clone(),
        Arc::new(ConsoleGateway),
    );

    let cancel = CancellationToken::new();
    let scheduler = CleanupScheduler::new(
        state.config.cleanup.clone(),
        Duration::from_secs(state.config.rate_limit.cleanup_secs),
        state.limiter.clone(),
        state.sessions.clone(),
        state.exports.clone(),
    );
    let sweeper = tokio::spawn(scheduler.run(cancel.clone()));

    println!();
    println!(
        "  {} Engine running. Type {} per line; {} to begin.",
        style("⚡").bold(),
        style("<identity> <text>").cyan(),
        style("<identity> /start").yellow()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());
    println!();

    let mut source = LineEventSource::stdin();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = source.next_event() => {
                let Some(event) = event else { break };
                // Handler errors were already reported to the participant.
                if let Err(e) = engine.handle_event(event).await {
                    debug!(error = %e, "event rejected");
                }
            }
        }
    }

    cancel.cancel();
    let _ = sweeper.await;
    println!("\n  Engine stopped.");
    Ok(())
}
