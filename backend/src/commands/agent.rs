//! SQL agent commands.
//!
//! `run_sql_agent` is the main entry point of the backend: it resolves the API
//! key, opens the database, runs the agent loop, extracts the executed queries
//! from the step stream and reports progress on the activity log as it goes.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::actors::DatabaseHandle;
use crate::agentic_loop::{run_agentic_loop, AgenticLoopConfig};
use crate::app_state::{AgentLogger, AppState};
use crate::error::AgentError;
use crate::llm::{AnthropicClient, AnthropicConfig, ChatModel};
use crate::paths::resolve_database_path;
use crate::protocol::{
    AgentLogEvent, AgentLogEventType as Kind, AgentResult, LogLevel, LogSource, QueryResult,
    RunAgentResponse,
};
use crate::sql_chain::{self, QueryChainConfig};
use crate::step_extractor::{QueryCollector, StepEvent};
use crate::system_prompt::build_agent_system_prompt;
use crate::tools::SqlToolkit;

/// Listen to the activity log. Dropping the receiver unsubscribes.
pub fn subscribe_agent_log(state: &AppState) -> broadcast::Receiver<AgentLogEvent> {
    state.subscribe_logs()
}

/// Run the SQL agent on `question` against the database at `db_path`
pub async fn run_sql_agent(state: &AppState, question: &str, db_path: &str) -> RunAgentResponse {
    let logger = state.logger().clone();
    announce_run(&logger, question, db_path);

    let model = match connect_llm(state, &logger).await {
        Ok(model) => model,
        Err(e) => return report_failure(&logger, e),
    };

    complete_run(&logger, drive_agent(state, &logger, model, question, db_path).await)
}

/// Same as `run_sql_agent` with a caller-supplied model instead of the Anthropic client
pub async fn run_sql_agent_with_model(
    state: &AppState,
    model: Arc<dyn ChatModel>,
    question: &str,
    db_path: &str,
) -> RunAgentResponse {
    let logger = state.logger().clone();
    announce_run(&logger, question, db_path);
    complete_run(&logger, drive_agent(state, &logger, model, question, db_path).await)
}

/// Run the single-shot query chain: one generated query, executed once
pub async fn run_sql_chain(state: &AppState, question: &str, db_path: &str) -> RunAgentResponse {
    let logger = state.logger().clone();
    announce_run(&logger, question, db_path);

    let model = match connect_llm(state, &logger).await {
        Ok(model) => model,
        Err(e) => return report_failure(&logger, e),
    };

    complete_run(&logger, drive_chain(state, &logger, model, question, db_path).await)
}

pub async fn run_sql_chain_with_model(
    state: &AppState,
    model: Arc<dyn ChatModel>,
    question: &str,
    db_path: &str,
) -> RunAgentResponse {
    let logger = state.logger().clone();
    announce_run(&logger, question, db_path);
    complete_run(&logger, drive_chain(state, &logger, model, question, db_path).await)
}

// ============ Run phases ============

fn announce_run(logger: &AgentLogger, question: &str, db_path: &str) {
    logger.log_kind(
        LogLevel::Info,
        LogSource::Agent,
        Kind::AgentStart,
        format!("Starting SQL agent for question: \"{}\"", question),
    );
    logger.log(LogLevel::Info, LogSource::System, format!("Using database: {}", db_path));
}

async fn connect_llm(state: &AppState, logger: &AgentLogger) -> Result<Arc<dyn ChatModel>, AgentError> {
    let Some(api_key) = state.current_api_key().await else {
        logger.log(LogLevel::Error, LogSource::Api, "ANTHROPIC_API_KEY is not set");
        return Err(AgentError::MissingApiKey);
    };

    logger.log_kind(
        LogLevel::Success,
        LogSource::Api,
        Kind::ApiRequest,
        "API key found, initializing LLM...",
    );
    let config = AnthropicConfig::from_settings(&*state.settings.read().await);
    let client = AnthropicClient::new(api_key, config)?;
    logger.log_kind(
        LogLevel::Success,
        LogSource::Api,
        Kind::ApiResponse,
        "LLM initialized successfully",
    );

    Ok(Arc::new(client))
}

async fn open_database(logger: &AgentLogger, db_path: &str) -> Result<DatabaseHandle, AgentError> {
    logger.log_kind(
        LogLevel::Info,
        LogSource::Database,
        Kind::DatabaseConnecting,
        "Connecting to database...",
    );
    let db = DatabaseHandle::connect(&resolve_database_path(db_path)).await?;
    logger.log_kind(
        LogLevel::Success,
        LogSource::Database,
        Kind::DatabaseConnected,
        "Database connected successfully",
    );
    Ok(db)
}

async fn drive_agent(
    state: &AppState,
    logger: &AgentLogger,
    model: Arc<dyn ChatModel>,
    question: &str,
    db_path: &str,
) -> Result<AgentResult, AgentError> {
    let settings = state.settings.read().await.clone();
    let db = open_database(logger, db_path).await?;

    logger.log(LogLevel::Info, LogSource::Agent, "Setting up SQL agent tools...");
    let toolkit = SqlToolkit::new(db, model.clone(), settings.dialect.clone());
    let config = AgenticLoopConfig {
        system_prompt: build_agent_system_prompt(&settings.dialect, settings.top_k),
        recursion_limit: settings.recursion_limit,
    };
    logger.log(
        LogLevel::Success,
        LogSource::Agent,
        "Agent initialized, beginning analysis...",
    );

    let (step_tx, mut step_rx) = mpsc::channel(32);
    let mut collector = QueryCollector::new();

    let run = run_agentic_loop(model.as_ref(), &toolkit, &config, question, step_tx);
    let observe = async {
        while let Some(step) = step_rx.recv().await {
            logger.log_kind(
                LogLevel::Debug,
                LogSource::Agent,
                Kind::AgentThinking,
                format!("Processing step {}...", step.index),
            );
            for event in collector.observe(&step) {
                log_step_event(logger, event);
            }
        }
    };
    let (outcome, ()) = tokio::join!(run, observe);

    if let Err(e) = outcome {
        toolkit.into_database().close().await;
        return Err(e);
    }

    logger.log(LogLevel::Success, LogSource::Agent, "Analysis complete, cleaning up...");
    toolkit.into_database().close().await;
    logger.log(LogLevel::Info, LogSource::Database, "Database connection closed");

    Ok(collector.finish())
}

async fn drive_chain(
    state: &AppState,
    logger: &AgentLogger,
    model: Arc<dyn ChatModel>,
    question: &str,
    db_path: &str,
) -> Result<AgentResult, AgentError> {
    let settings = state.settings.read().await.clone();
    let db = open_database(logger, db_path).await?;
    let config = QueryChainConfig {
        dialect: settings.dialect.clone(),
        top_k: settings.chain_top_k,
    };

    let outcome = run_chain_query(logger, model.as_ref(), &db, &config, question).await;
    db.close().await;
    logger.log(LogLevel::Info, LogSource::Database, "Database connection closed");

    let query_result = outcome?;

    Ok(AgentResult {
        queries: vec![query_result],
        final_answer: String::new(),
    })
}

async fn run_chain_query(
    logger: &AgentLogger,
    model: &dyn ChatModel,
    db: &DatabaseHandle,
    config: &QueryChainConfig,
    question: &str,
) -> Result<QueryResult, AgentError> {
    let query = sql_chain::generate_sql_query(model, db, config, question).await?;
    log_step_event(logger, StepEvent::QueryGenerated { query: query.clone() });
    log_step_event(logger, StepEvent::QueryExecuting { query: query.clone() });

    let output = sql_chain::execute_generated_query(db, query).await?;
    log_step_event(
        logger,
        StepEvent::QueryCaptured {
            query: output.query_result.query.clone(),
            row_count: output.row_count,
            json: output.is_json,
        },
    );
    Ok(output.query_result)
}

fn complete_run(logger: &AgentLogger, outcome: Result<AgentResult, AgentError>) -> RunAgentResponse {
    match outcome {
        Ok(result) => {
            logger.log_kind(
                LogLevel::Success,
                LogSource::System,
                Kind::AgentComplete,
                format!(
                    "Agent completed successfully with {} SQL queries",
                    result.queries.len()
                ),
            );
            RunAgentResponse::ok(result)
        }
        Err(e) => report_failure(logger, e),
    }
}

fn report_failure(logger: &AgentLogger, error: AgentError) -> RunAgentResponse {
    let message = error.to_string();
    logger.log_data(
        LogLevel::Error,
        LogSource::System,
        Kind::AgentError,
        format!("Agent failed: {}", message),
        json!({ "error": format!("{:?}", error) }),
    );
    RunAgentResponse::failed(message)
}

fn log_step_event(logger: &AgentLogger, event: StepEvent) {
    match event {
        StepEvent::QueryGenerated { query } => logger.log_data(
            LogLevel::Info,
            LogSource::Agent,
            Kind::SqlQueryGenerated,
            "Generated SQL query",
            json!({ "query": query }),
        ),
        StepEvent::QueryExecuting { .. } => logger.log_kind(
            LogLevel::Info,
            LogSource::Database,
            Kind::SqlQueryExecuting,
            "Executing SQL query...",
        ),
        StepEvent::QueryCaptured {
            query,
            row_count,
            json: true,
        } => logger.log_data(
            LogLevel::Success,
            LogSource::Database,
            Kind::SqlQueryResult,
            "Query executed successfully",
            json!({
                "rowCount": row_count.map(|n| json!(n)).unwrap_or_else(|| json!("N/A")),
                "query": query,
            }),
        ),
        StepEvent::QueryCaptured {
            query, json: false, ..
        } => logger.log_data(
            LogLevel::Success,
            LogSource::Database,
            Kind::SqlQueryResult,
            "Query executed (non-JSON result)",
            json!({ "query": query }),
        ),
        StepEvent::FinalAnswer => logger.log_kind(
            LogLevel::Info,
            LogSource::Agent,
            Kind::AgentResponse,
            "Agent generating final response...",
        ),
    }
}
