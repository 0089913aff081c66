//! Broadcast CLI command: fan a message out to every known respondent.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use surveyor_core::broadcast::{self, BroadcastConfig};
use surveyor_core::store::SurveyStore;
use surveyor_infra::console::ConsoleGateway;

use crate::state::AppState;

pub async fn broadcast(state: &AppState, message: String, json: bool) -> Result<()> {
    let targets = state.store.known_identities().await?;

    if targets.is_empty() {
        if json {
            println!("{}", serde_json::json!({ "sent": [], "failed": [] }));
        } else {
            println!();
            println!(
                "  {} Nobody has answered a survey yet; nothing to send.",
                style("i").blue().bold()
            );
            println!();
        }
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Broadcasting to {} recipients...", targets.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    // Ctrl+C stops scheduling new deliveries; in-flight ones finish.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let report = broadcast::broadcast(
        Arc::new(ConsoleGateway),
        message,
        targets,
        BroadcastConfig::default(),
        cancel,
    )
    .await;

    spinner.finish_and_clear();

    if json {
        let out = serde_json::json!({
            "sent": report.sent,
            "failed": report
                .failed
                .iter()
                .map(|(identity, reason)| serde_json::json!({
                    "identity": identity,
                    "reason": reason,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Delivered to {} recipient{}.",
        style("✓").green().bold(),
        style(report.sent.len()).bold(),
        if report.sent.len() == 1 { "" } else { "s" }
    );
    for (identity, reason) in &report.failed {
        println!(
            "  {} {} -- {}",
            style("✗").red(),
            identity,
            style(reason).dim()
        );
    }
    println!();
    Ok(())
}
