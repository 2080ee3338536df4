use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============ Agent Messages ============

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// The `input` argument every SQL tool takes, if present and non-empty
    pub fn input(&self) -> Option<&str> {
        self.args
            .get("input")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// One message in the agent conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl AgentMessage {
    pub fn human(content: impl Into<String>) -> Self {
        AgentMessage::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        AgentMessage::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    /// Short type label used in logs ("human", "ai", "tool")
    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::Human { .. } => "human",
            AgentMessage::Ai { .. } => "ai",
            AgentMessage::Tool { .. } => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            AgentMessage::Human { content }
            | AgentMessage::Ai { content, .. }
            | AgentMessage::Tool { content, .. } => content,
        }
    }

    /// Tool calls carried by an AI message (empty for every other kind)
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            AgentMessage::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Schema of a tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One unit of the agent stream: the message most recently appended to the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    /// 1-based position in the stream
    pub index: usize,
    pub message: AgentMessage,
}

// ============ Agent Results ============

/// A SQL statement the agent executed together with its rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub result: Vec<Value>,
}

/// Consolidated outcome of one agent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub queries: Vec<QueryResult>,
    pub final_answer: String,
}

/// Reply of the `run_sql_agent` command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AgentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunAgentResponse {
    pub fn ok(result: AgentResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Reply of the `validate_database` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseValidation {
    pub valid: bool,
    pub path: String,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============ Activity Log ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Agent,
    Database,
    Api,
    System,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Agent => "agent",
            LogSource::Database => "database",
            LogSource::Api => "api",
            LogSource::System => "system",
        }
    }
}

/// Semantic classification of an activity log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLogEventType {
    AgentStart,
    AgentThinking,
    SqlQueryGenerated,
    SqlQueryExecuting,
    SqlQueryResult,
    AgentResponse,
    AgentComplete,
    AgentError,
    DatabaseConnecting,
    DatabaseConnected,
    ApiRequest,
    ApiResponse,
}

/// Event pushed to activity log listeners while an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLogEvent {
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AgentLogEventType>,
    pub timestamp: DateTime<Utc>,
}

impl AgentLogEvent {
    pub fn new(level: LogLevel, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            level,
            source,
            message: message.into(),
            data: None,
            kind: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_kind(mut self, kind: AgentLogEventType) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_input_ignores_empty_and_missing() {
        let call = ToolCall {
            id: "t1".to_string(),
            name: "query-sql".to_string(),
            args: json!({"input": "SELECT 1"}),
        };
        assert_eq!(call.input(), Some("SELECT 1"));

        let empty = ToolCall {
            args: json!({"input": ""}),
            ..call.clone()
        };
        assert_eq!(empty.input(), None);

        let missing = ToolCall {
            args: json!({}),
            ..call
        };
        assert_eq!(missing.input(), None);
    }

    #[test]
    fn test_agent_message_serde_tagging() {
        let msg = AgentMessage::Tool {
            tool_call_id: "t1".to_string(),
            name: "list-tables-sql".to_string(),
            content: "Album, Artist".to_string(),
            is_error: false,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "tool");
        assert_eq!(value["name"], "list-tables-sql");

        let parsed: AgentMessage =
            serde_json::from_value(json!({"type": "ai", "content": "done"})).unwrap();
        assert_eq!(parsed.kind(), "ai");
        assert!(parsed.tool_calls().is_empty());
    }

    #[test]
    fn test_agent_result_uses_camel_case() {
        let result = AgentResult {
            queries: vec![],
            final_answer: "42".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["finalAnswer"], "42");
    }

    #[test]
    fn test_log_event_wire_shape() {
        let event = AgentLogEvent::new(LogLevel::Success, LogSource::Database, "connected")
            .with_kind(AgentLogEventType::DatabaseConnected);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["level"], "success");
        assert_eq!(value["source"], "database");
        assert_eq!(value["kind"], "database_connected");
        assert!(value.get("data").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_run_agent_response_failure_omits_result() {
        let value = serde_json::to_value(RunAgentResponse::failed("boom")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "boom");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_database_validation_wire_shape() {
        let validation = DatabaseValidation {
            valid: true,
            path: "Chinook.db".to_string(),
            tables: vec!["Album".to_string()],
            error: None,
        };
        let value = serde_json::to_value(&validation).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"valid": true, "path": "Chinook.db", "tables": ["Album"]})
        );
    }
}
