//! SQL toolkit offered to the agent.
//!
//! - `query-sql`: execute a query and return its rows as JSON
//! - `info-sql`: schema and sample rows for a list of tables
//! - `list-tables-sql`: comma-separated table names
//! - `query-checker`: ask the LLM to double check a query
//!
//! Every tool takes a single `{ "input": string }` argument.

pub mod info_sql;
pub mod list_tables;
pub mod query_checker;
pub mod query_sql;

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::actors::DatabaseHandle;
use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::protocol::{ToolCall, ToolDefinition};

pub use info_sql::INFO_SQL_TOOL;
pub use list_tables::LIST_TABLES_TOOL;
pub use query_checker::QUERY_CHECKER_TOOL;
pub use query_sql::QUERY_SQL_TOOL;

/// Arguments shared by every SQL tool
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SqlToolInput {
    #[serde(default)]
    pub input: String,
}

impl SqlToolInput {
    pub fn from_args(args: &Value) -> Result<Self, AgentError> {
        if args.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(args.clone()).map_err(|e| AgentError::ToolInput(e.to_string()))
    }
}

/// `{ input?: string }`
pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": { "type": "string" }
        },
        "additionalProperties": false
    })
}

fn definition(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: input_schema(),
    }
}

/// Result of one tool call as it goes back into the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// The four SQL tools bound to one database and one checker model
pub struct SqlToolkit {
    db: DatabaseHandle,
    llm: Arc<dyn ChatModel>,
    dialect: String,
}

impl SqlToolkit {
    pub fn new(db: DatabaseHandle, llm: Arc<dyn ChatModel>, dialect: impl Into<String>) -> Self {
        Self {
            db,
            llm,
            dialect: dialect.into(),
        }
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.db
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Give back the database handle so the caller can close it
    pub fn into_database(self) -> DatabaseHandle {
        self.db
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            definition(QUERY_SQL_TOOL, query_sql::DESCRIPTION),
            definition(INFO_SQL_TOOL, info_sql::DESCRIPTION),
            definition(LIST_TABLES_TOOL, list_tables::DESCRIPTION),
            definition(QUERY_CHECKER_TOOL, query_checker::DESCRIPTION),
        ]
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.definitions().into_iter().map(|d| d.name).collect()
    }

    /// Dispatch a tool call by name.
    ///
    /// Errors raised by a tool come back as an error output telling the model
    /// to fix its call; they never abort the run.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        tracing::debug!("[SqlToolkit] {} args={}", call.name, call.args);

        let input = match SqlToolInput::from_args(&call.args) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(tool_error_message(&e)),
        };

        let result = match call.name.as_str() {
            QUERY_SQL_TOOL => query_sql::execute(&self.db, &input.input).await,
            INFO_SQL_TOOL => info_sql::execute(&self.db, &input.input).await,
            LIST_TABLES_TOOL => list_tables::execute(&self.db).await,
            QUERY_CHECKER_TOOL => {
                query_checker::execute(self.llm.as_ref(), &self.dialect, &input.input).await
            }
            other => {
                return ToolOutput::error(format!(
                    "Error: {} is not a valid tool, try one of [{}].",
                    other,
                    self.tool_names().join(", ")
                ));
            }
        };

        match result {
            Ok(content) => ToolOutput::ok(content),
            Err(e) => {
                tracing::warn!("[SqlToolkit] {} failed: {}", call.name, e);
                ToolOutput::error(tool_error_message(&e))
            }
        }
    }
}

fn tool_error_message(error: &AgentError) -> String {
    let message = match error {
        AgentError::Database(msg) | AgentError::ToolInput(msg) => msg.clone(),
        other => other.to_string(),
    };
    format!("Error: {}\n Please fix your mistakes.", message)
}
