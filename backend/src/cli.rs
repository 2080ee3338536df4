//! Command-line argument parsing and the one-shot CLI run.
//!
//! The CLI stands in for the desktop shell: it layers launch overrides over
//! the persisted settings, streams the activity log to stderr while the agent
//! works, and prints the report (Markdown or JSON) to stdout.

use clap::{Parser, ValueEnum};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

use crate::agent_service::{AgentService, MockAgentService};
use crate::app_state::AppState;
use crate::commands::{
    get_api_key_status, run_sql_agent, run_sql_chain, set_api_key_override, subscribe_agent_log,
    validate_database,
};
use crate::log_store::{render_line, LogStore};
use crate::markdown::{format_agent_result_to_markdown, generate_error_response};
use crate::protocol::{AgentLogEvent, RunAgentResponse};
use crate::settings::{self, AppSettings};

/// How the question is answered
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Tool-calling agent loop
    #[default]
    Agent,
    /// One generated query, executed once
    Chain,
    /// Canned response, no API key or database needed
    Mock,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// CLI arguments for sql-agent-desk
#[derive(Parser, Debug, Clone)]
#[command(name = "sql-agent-desk", about = "Ask questions about a SQLite database in plain language")]
pub struct CliArgs {
    /// Question to answer (string or @path/to/file)
    #[arg(value_name = "QUESTION_OR_@FILE")]
    pub question: Option<String>,
    /// SQLite database to query (defaults to the saved database path)
    #[arg(long, value_name = "PATH", env = "SQL_AGENT_DB")]
    pub db: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Agent, env = "SQL_AGENT_MODE")]
    pub mode: RunMode,
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown, env = "SQL_AGENT_FORMAT")]
    pub format: OutputFormat,
    /// Anthropic model id
    #[arg(long, value_name = "MODEL", env = "SQL_AGENT_MODEL")]
    pub model: Option<String>,
    /// Override API key for this run (string or @path/to/file)
    #[arg(long, value_name = "KEY_OR_@FILE", env = "SQL_AGENT_API_KEY")]
    pub api_key: Option<String>,
    /// Row cap the agent is asked to respect
    #[arg(long, value_name = "INT", env = "SQL_AGENT_TOP_K")]
    pub top_k: Option<usize>,
    /// Maximum number of agent steps
    #[arg(long, value_name = "INT", env = "SQL_AGENT_RECURSION_LIMIT")]
    pub recursion_limit: Option<usize>,
    /// Base URL of the Anthropic API
    #[arg(long, value_name = "URL", env = "SQL_AGENT_BASE_URL")]
    pub base_url: Option<String>,
    /// Validate the database and list its tables, then exit
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub validate: bool,
    /// Print which API key would be used, then exit
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub key_status: bool,
    /// Do not print the activity log
    #[arg(
        long,
        value_name = "BOOL",
        env = "SQL_AGENT_QUIET",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub quiet: bool,
    /// Persist the overridden settings before running
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub save_settings: bool,
}

/// What a run printed and whether it succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct CliOutput {
    pub stdout: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Read a value that may be either a literal string or a @path reference to a file
pub fn read_value_or_file(raw: &str) -> Result<String, String> {
    if let Some(path) = raw.strip_prefix('@') {
        let contents = fs::read_to_string(Path::new(path))
            .map_err(|e| format!("Failed to read {}: {}", path, e))?;
        Ok(contents.trim_end().to_string())
    } else {
        Ok(raw.to_string())
    }
}

/// Apply CLI overrides to settings without persisting them.
pub fn apply_cli_overrides(args: &CliArgs, settings: &mut AppSettings) {
    if let Some(db) = &args.db {
        settings.database_path = db.clone();
    }
    if let Some(model) = &args.model {
        settings.model = model.clone();
    }
    if let Some(top_k) = args.top_k {
        settings.top_k = top_k.max(1);
    }
    if let Some(limit) = args.recursion_limit {
        settings.recursion_limit = limit.max(1);
    }
    if let Some(url) = &args.base_url {
        settings.anthropic_base_url = url.trim_end_matches('/').to_string();
    }
}

/// Load settings, apply overrides and run. Prints the report to stdout.
pub async fn run_cli(args: CliArgs) -> Result<(), String> {
    let mut settings = settings::load_settings().await;
    apply_cli_overrides(&args, &mut settings);

    if args.save_settings {
        settings::save_settings(&settings).await?;
        tracing::info!("[Cli] Settings saved");
    }

    let state = AppState::new(settings);
    let output = execute(&args, &state).await?;
    println!("{}", output.stdout);

    if output.success {
        Ok(())
    } else {
        Err(output.error.unwrap_or_else(|| "Run failed".to_string()))
    }
}

/// Run whatever `args` asks for against `state` and collect the output
pub async fn execute(args: &CliArgs, state: &AppState) -> Result<CliOutput, String> {
    if let Some(raw) = &args.api_key {
        set_api_key_override(state, &read_value_or_file(raw)?).await?;
    }

    if args.key_status {
        let status = get_api_key_status(state).await;
        return Ok(CliOutput {
            stdout: to_pretty_json(&status)?,
            success: true,
            error: None,
        });
    }

    let db_path = state.settings.read().await.database_path.clone();

    if args.validate {
        let validation = validate_database(&db_path).await;
        return Ok(CliOutput {
            stdout: to_pretty_json(&validation)?,
            success: validation.valid,
            error: validation.error,
        });
    }

    let question = match &args.question {
        Some(raw) => read_value_or_file(raw)?,
        None => return Err("No question given. Pass one as the first argument.".to_string()),
    };
    if question.trim().is_empty() {
        return Err("Question is empty".to_string());
    }

    if args.mode == RunMode::Mock {
        let delay = state.settings.read().await.mock_delay_ms;
        let mut service = MockAgentService::new(Duration::from_millis(delay));
        service.set_database_path(&db_path);
        let text = service.process_question(&question).await;
        let stdout = match args.format {
            OutputFormat::Markdown => text,
            OutputFormat::Json => to_pretty_json(&json!({ "success": true, "markdown": text }))?,
        };
        return Ok(CliOutput {
            stdout,
            success: true,
            error: None,
        });
    }

    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_activity_log(
        subscribe_agent_log(state),
        done_rx,
        !args.quiet,
    ));

    let response = match args.mode {
        RunMode::Chain => run_sql_chain(state, &question, &db_path).await,
        _ => run_sql_agent(state, &question, &db_path).await,
    };

    let _ = done_tx.send(());
    if let Ok(store) = printer.await {
        tracing::debug!("[Cli] Activity log had {} entries", store.len());
    }

    Ok(CliOutput {
        stdout: render_response(&question, &response, args.format)?,
        success: response.success,
        error: response.error.clone(),
    })
}

/// Render a run reply the way the chat view shows it, or as JSON
pub fn render_response(
    question: &str,
    response: &RunAgentResponse,
    format: OutputFormat,
) -> Result<String, String> {
    match format {
        OutputFormat::Json => to_pretty_json(response),
        OutputFormat::Markdown => match (&response.result, response.success) {
            (Some(result), true) => Ok(format_agent_result_to_markdown(result)),
            _ => Ok(generate_error_response(
                question,
                response.error.as_deref().unwrap_or_default(),
            )),
        },
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

/// Echo activity log events to stderr until `done` fires, then flush what is buffered
async fn print_activity_log(
    mut rx: broadcast::Receiver<AgentLogEvent>,
    mut done: oneshot::Receiver<()>,
    echo: bool,
) -> LogStore {
    let mut store = LogStore::new();
    let record = |event: AgentLogEvent, store: &mut LogStore| {
        let entry = store.add_from_event(&event);
        if echo {
            eprintln!("{}", render_line(entry));
        }
    };

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(event) => record(event, &mut store),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Cli] Activity log skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut done => {
                while let Ok(event) = rx.try_recv() {
                    record(event, &mut store);
                }
                break;
            }
        }
    }

    store
}
