//! Single-shot "generate SQL, then execute it" chain.
//!
//! Unlike the agent, the chain makes exactly one model call: the model sees
//! the full schema and must answer through the forced `QueryOutput` tool, whose
//! only field is the SQL to run.

use serde_json::json;

use crate::actors::DatabaseHandle;
use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest, ToolChoice};
use crate::protocol::{AgentMessage, QueryResult, ToolDefinition};
use crate::step_extractor::parse_tool_result;
use crate::system_prompt::build_query_chain_prompt;
use crate::tools::query_sql;

pub const QUERY_OUTPUT_TOOL: &str = "QueryOutput";

#[derive(Debug, Clone)]
pub struct QueryChainConfig {
    pub dialect: String,
    pub top_k: usize,
}

/// An executed chain query and how its tool output parsed
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub query_result: QueryResult,
    /// Row count when the output was a JSON array
    pub row_count: Option<usize>,
    /// False when the output was plain text, e.g. an SQL error
    pub is_json: bool,
}

/// Structured-output schema: `{ query: string }`
pub fn query_output_tool() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_OUTPUT_TOOL.to_string(),
        description: "Generated SQL query.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Syntactically valid SQL query."
                }
            },
            "required": ["query"]
        }),
    }
}

/// Ask the model for a query answering `question`
pub async fn generate_sql_query(
    model: &dyn ChatModel,
    db: &DatabaseHandle,
    config: &QueryChainConfig,
    question: &str,
) -> Result<String, AgentError> {
    let table_info = db.table_info(Vec::new()).await?;
    let prompt = build_query_chain_prompt(&config.dialect, config.top_k, &table_info, question);

    let request = ChatRequest {
        system: None,
        messages: vec![AgentMessage::human(prompt)],
        tools: vec![query_output_tool()],
        tool_choice: Some(ToolChoice::Tool(QUERY_OUTPUT_TOOL.to_string())),
    };

    let reply = model.invoke(&request).await?;
    extract_query(&reply)
}

fn extract_query(reply: &AgentMessage) -> Result<String, AgentError> {
    reply
        .tool_calls()
        .iter()
        .find(|c| c.name == QUERY_OUTPUT_TOOL)
        .and_then(|c| c.args.get("query"))
        .and_then(|q| q.as_str())
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AgentError::Llm("Model did not return a SQL query".to_string()))
}

/// Run a generated query through `query-sql` and parse its output
pub async fn execute_generated_query(
    db: &DatabaseHandle,
    query: String,
) -> Result<ChainOutput, AgentError> {
    let output = query_sql::execute(db, &query).await?;
    let (result, row_count, is_json) = parse_tool_result(&output);
    if !is_json {
        tracing::warn!("[SqlChain] Query returned text: {}", query_sql::truncate_sql(&output, 200));
    }

    Ok(ChainOutput {
        query_result: QueryResult { query, result },
        row_count,
        is_json,
    })
}

/// Generate a query for `question`, run it, and return it with its rows
pub async fn run_sql_chain(
    model: &dyn ChatModel,
    db: &DatabaseHandle,
    config: &QueryChainConfig,
    question: &str,
) -> Result<ChainOutput, AgentError> {
    let query = generate_sql_query(model, db, config, question).await?;
    tracing::info!("[SqlChain] Generated query: {}", query_sql::truncate_sql(&query, 100));
    execute_generated_query(db, query).await
}
