//! Survey lifecycle CLI commands: create, list, show, edit, delete,
//! activate, close, stats, export.

use anyhow::{anyhow, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::{Confirm, Input};

use surveyor_core::store::SurveyStore;
use surveyor_core::validate;
use surveyor_types::survey::{Question, Survey, SurveyId, SurveyStatus};

use crate::state::AppState;

/// Create a new survey via interactive wizard or one-shot flags.
///
/// # Examples
///
/// ```bash
/// # Interactive wizard
/// svyr survey create
///
/// # One-shot with flags (free-text questions only)
/// svyr survey create --title "Commute habits" \
///     --description "How people get to work" \
///     --question "How do you commute?" --question "How long does it take?"
/// ```
pub async fn create(
    state: &AppState,
    title: Option<String>,
    description: Option<String>,
    questions: Vec<String>,
    json: bool,
) -> Result<()> {
    let interactive = title.is_none();

    let title = match title {
        Some(t) => t,
        None => Input::<String>::new()
            .with_prompt("Survey title")
            .interact_text()?,
    };

    let description = match description {
        Some(d) => d,
        None => Input::<String>::new()
            .with_prompt("Description")
            .interact_text()?,
    };

    let questions = if questions.is_empty() && interactive {
        question_wizard()?
    } else {
        questions.into_iter().map(Question::free_text).collect()
    };

    let survey = Survey::new(title, description, questions);
    validate::validate_survey(&survey, &state.config.limits).map_err(|e| anyhow!(e))?;
    state.store.create_survey(&survey).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&survey)?);
        return Ok(());
    }

    println!();
    println!("  {} Survey created as a draft.", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Title:").bold(), style(&survey.title).cyan());
    println!("  {}  {}", style("Id:").bold(), style(survey.id).dim());
    println!(
        "  {}  {}",
        style("Questions:").bold(),
        survey.questions.len()
    );
    println!();
    println!(
        "  Open it to participants with: {}",
        style(format!("svyr survey activate {}", survey.id)).yellow()
    );
    println!();
    Ok(())
}

/// Prompt for questions one at a time until an empty prompt is entered.
fn question_wizard() -> Result<Vec<Question>> {
    let mut questions = Vec::new();
    loop {
        let prompt: String = Input::new()
            .with_prompt(format!(
                "Question {} (leave empty to finish)",
                questions.len() + 1
            ))
            .allow_empty(true)
            .interact_text()?;
        if prompt.trim().is_empty() {
            break;
        }

        let with_options = Confirm::new()
            .with_prompt("Offer fixed answer options?")
            .default(false)
            .interact()?;
        if !with_options {
            questions.push(Question::free_text(prompt));
            continue;
        }

        let options: String = Input::new()
            .with_prompt("Options (comma-separated)")
            .interact_text()?;
        let options: Vec<String> = options
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let allow_custom = Confirm::new()
            .with_prompt("Also accept a free-typed answer?")
            .default(false)
            .interact()?;
        questions.push(Question::single_choice(prompt, options, allow_custom));
    }
    Ok(questions)
}

/// List all surveys in a table.
pub async fn list(state: &AppState, json: bool) -> Result<()> {
    let surveys = state.store.list_surveys().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&surveys)?);
        return Ok(());
    }

    if surveys.is_empty() {
        println!();
        println!(
            "  {} No surveys yet. Create one with: {}",
            style("i").blue().bold(),
            style("svyr survey create").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Questions").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for survey in &surveys {
        table.add_row(vec![
            Cell::new(survey.id).fg(Color::DarkGrey),
            Cell::new(&survey.title).fg(Color::Cyan),
            status_cell(survey.status),
            Cell::new(survey.questions.len()),
            Cell::new(survey.created_at.format("%Y-%m-%d %H:%M").to_string())
                .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} survey{}",
        style(surveys.len()).bold(),
        if surveys.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Show one survey with its full question list.
pub async fn show(state: &AppState, id: SurveyId, json: bool) -> Result<()> {
    let survey = require_survey(state, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&survey)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&survey.title).cyan().bold());
    println!("  {}", style(&survey.description).dim());
    println!();
    println!("  {}  {}", style("Id:").bold(), style(survey.id).dim());
    println!("  {}  {}", style("Status:").bold(), survey.status);
    println!(
        "  {}  {}",
        style("Created:").bold(),
        survey.created_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    for (i, question) in survey.questions.iter().enumerate() {
        println!("  {} {}", style(format!("{}.", i + 1)).bold(), question.prompt);
        if let surveyor_types::survey::QuestionKind::SingleChoice {
            options,
            allow_custom,
        } = &question.kind
        {
            for option in options {
                println!("       {} {option}", style("•").dim());
            }
            if *allow_custom {
                println!("       {}", style("(free-typed answers accepted)").dim());
            }
        }
    }
    println!();
    Ok(())
}

/// Edit survey metadata. Question edits are rejected by the store once
/// answers exist; title and description stay editable.
pub async fn edit(
    state: &AppState,
    id: SurveyId,
    title: Option<String>,
    description: Option<String>,
    json: bool,
) -> Result<()> {
    let mut survey = require_survey(state, id).await?;

    if let Some(title) = title {
        survey.title = title;
    }
    if let Some(description) = description {
        survey.description = description;
    }
    validate::validate_survey(&survey, &state.config.limits).map_err(|e| anyhow!(e))?;
    state.store.update_survey(&survey).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&survey)?);
        return Ok(());
    }
    println!();
    println!("  {} Survey updated.", style("✓").green().bold());
    println!();
    Ok(())
}

/// Delete a survey and its answer set permanently.
pub async fn delete(state: &AppState, id: SurveyId, force: bool, json: bool) -> Result<()> {
    let survey = require_survey(state, id).await?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete '{}' and all of its answers? This cannot be undone",
                survey.title
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Aborted.");
            return Ok(());
        }
    }

    state.store.delete_survey(&id).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
        return Ok(());
    }
    println!();
    println!(
        "  {} Survey '{}' deleted.",
        style("✓").green().bold(),
        survey.title
    );
    println!();
    Ok(())
}

/// Open a survey to participants.
pub async fn activate(state: &AppState, id: SurveyId, json: bool) -> Result<()> {
    let mut survey = require_survey(state, id).await?;
    if survey.status == SurveyStatus::Active {
        return Err(anyhow!("survey is already active"));
    }
    // A survey must be publishable before participants can see it.
    validate::validate_survey(&survey, &state.config.limits).map_err(|e| anyhow!(e))?;

    survey.status = SurveyStatus::Active;
    state.store.update_survey(&survey).await?;
    report_status(&survey, json)
}

/// Close a survey to new sessions.
pub async fn close(state: &AppState, id: SurveyId, json: bool) -> Result<()> {
    let mut survey = require_survey(state, id).await?;
    if survey.status != SurveyStatus::Active {
        return Err(anyhow!("only an active survey can be closed"));
    }

    survey.status = SurveyStatus::Closed;
    state.store.update_survey(&survey).await?;
    report_status(&survey, json)
}

/// Show answer and session statistics for a survey.
pub async fn stats(state: &AppState, id: SurveyId, json: bool) -> Result<()> {
    let survey = require_survey(state, id).await?;
    let answers = state.store.answers(&id).await?;
    let respondents = {
        let mut ids: Vec<_> = answers.iter().map(|a| a.identity).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    };
    let (in_progress, completed, abandoned) = state.sessions.session_counts(&id);

    if json {
        let out = serde_json::json!({
            "id": id,
            "title": survey.title,
            "status": survey.status.to_string(),
            "answers": answers.len(),
            "respondents": respondents,
            "sessions": {
                "in_progress": in_progress,
                "completed": completed,
                "abandoned": abandoned,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&survey.title).cyan().bold());
    println!();
    println!("  {}  {}", style("Status:").bold(), survey.status);
    println!("  {}  {}", style("Answers:").bold(), answers.len());
    println!("  {}  {}", style("Respondents:").bold(), respondents);
    println!(
        "  {}  {} in progress, {} completed, {} abandoned",
        style("Sessions:").bold(),
        in_progress,
        completed,
        abandoned
    );
    println!();
    Ok(())
}

/// Export a survey's answers to a timestamped artifact file.
pub async fn export(state: &AppState, id: SurveyId, json: bool) -> Result<()> {
    let survey = require_survey(state, id).await?;
    let snapshot = state.store.export_snapshot(&id).await?;
    let path = state.exports.write_artifact(&id, snapshot).await?;

    if json {
        let out = serde_json::json!({
            "id": id,
            "title": survey.title,
            "path": path,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!();
    println!(
        "  {} Exported '{}' to {}",
        style("✓").green().bold(),
        survey.title,
        style(path.display()).yellow()
    );
    println!();
    Ok(())
}

async fn require_survey(state: &AppState, id: SurveyId) -> Result<Survey> {
    state
        .store
        .get_survey(&id)
        .await?
        .ok_or_else(|| anyhow!("no survey with id {id}"))
}

fn report_status(survey: &Survey, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({ "id": survey.id, "status": survey.status.to_string() })
        );
        return Ok(());
    }
    println!();
    println!(
        "  {} Survey '{}' is now {}.",
        style("✓").green().bold(),
        survey.title,
        style(&survey.status).bold()
    );
    println!();
    Ok(())
}

fn status_cell(status: SurveyStatus) -> Cell {
    match status {
        SurveyStatus::Draft => Cell::new("◌ draft").fg(Color::Yellow),
        SurveyStatus::Active => Cell::new("● active").fg(Color::Green),
        SurveyStatus::Closed => Cell::new("○ closed").fg(Color::DarkGrey),
    }
}
