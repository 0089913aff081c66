//! CLI command definitions and dispatch for the `svyr` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a
//! verb-noun pattern (e.g., `svyr survey create`, `svyr survey list`).

pub mod broadcast;
pub mod run;
pub mod survey;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Run surveys over chat transports and manage their data.
#[derive(Parser)]
#[command(name = "svyr", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage surveys (create, list, stats, export, lifecycle).
    Survey {
        #[command(subcommand)]
        action: SurveyCommand,
    },

    /// Send a message to every identity that has ever answered.
    Broadcast {
        /// Message text to deliver.
        message: String,
    },

    /// Run the interactive engine on the console transport.
    ///
    /// Reads `<identity> <text>` lines from stdin; `/start` begins a
    /// survey, plain text answers the current question.
    Run,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SurveyCommand {
    /// Create a new survey via interactive wizard or one-shot flags.
    Create {
        /// Survey title (skips the wizard if provided).
        #[arg(long)]
        title: Option<String>,

        /// Survey description.
        #[arg(long)]
        description: Option<String>,

        /// Free-text question prompt (repeatable, in order).
        #[arg(long = "question")]
        questions: Vec<String>,
    },

    /// List all surveys.
    #[command(alias = "ls")]
    List,

    /// Show one survey with its questions.
    Show {
        /// Survey id.
        id: Uuid,
    },

    /// Edit survey metadata.
    Edit {
        /// Survey id.
        id: Uuid,

        /// New title.
        #[arg(long)]
        title: Option<String>,

        /// New description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a survey and its answers permanently.
    #[command(alias = "rm")]
    Delete {
        /// Survey id.
        id: Uuid,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Open a survey for participants (draft or closed -> active).
    Activate {
        /// Survey id.
        id: Uuid,
    },

    /// Close a survey to new sessions (active -> closed).
    Close {
        /// Survey id.
        id: Uuid,
    },

    /// Show answer and session statistics for a survey.
    Stats {
        /// Survey id.
        id: Uuid,
    },

    /// Export a survey's answers to a timestamped artifact file.
    Export {
        /// Survey id.
        id: Uuid,
    },
}
