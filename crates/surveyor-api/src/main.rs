//! Surveyor CLI entry point.
//!
//! Binary name: `svyr`
//!
//! Parses CLI arguments, opens the data directory, then dispatches to the
//! appropriate command handler or starts the interactive engine loop.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, SurveyCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,surveyor=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "svyr", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Survey { action } => match action {
            SurveyCommand::Create {
                title,
                description,
                questions,
            } => {
                cli::survey::create(&state, title, description, questions, cli.json).await?;
            }
            SurveyCommand::List => {
                cli::survey::list(&state, cli.json).await?;
            }
            SurveyCommand::Show { id } => {
                cli::survey::show(&state, id, cli.json).await?;
            }
            SurveyCommand::Edit {
                id,
                title,
                description,
            } => {
                cli::survey::edit(&state, id, title, description, cli.json).await?;
            }
            SurveyCommand::Delete { id, force } => {
                cli::survey::delete(&state, id, force, cli.json).await?;
            }
            SurveyCommand::Activate { id } => {
                cli::survey::activate(&state, id, cli.json).await?;
            }
            SurveyCommand::Close { id } => {
                cli::survey::close(&state, id, cli.json).await?;
            }
            SurveyCommand::Stats { id } => {
                cli::survey::stats(&state, id, cli.json).await?;
            }
            SurveyCommand::Export { id } => {
                cli::survey::export(&state, id, cli.json).await?;
            }
        },

        Commands::Broadcast { message } => {
            cli::broadcast::broadcast(&state, message, cli.json).await?;
        }

        Commands::Run => {
            cli::run::run(state).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
