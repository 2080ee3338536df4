//! Error type shared by the agent pipeline.
//!
//! Library code returns `AgentError`; the command layer converts it to a
//! `String` at the RPC boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("Failed to initialize database at {path}: {message}")]
    DatabaseInit { path: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("Recursion limit of {0} reached without hitting a stop condition")]
    RecursionLimit(usize),

    #[error("{0} actor stopped unexpectedly")]
    ActorClosed(&'static str),

    #[error("Invalid tool input: {0}")]
    ToolInput(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
