//! Chat model abstraction used by the agent loop, the query checker and the
//! query chain.
//!
//! - `anthropic`: Anthropic Messages API client

pub mod anthropic;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::protocol::{AgentMessage, ToolDefinition};

pub use anthropic::{AnthropicClient, AnthropicConfig};

/// How the model may pick tools for a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    Any,
    /// Force a call to the named tool (used for structured output)
    Tool(String),
}

/// One model invocation
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<AgentMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    /// A single user prompt with no tools
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            messages: vec![AgentMessage::human(text)],
            ..Self::default()
        }
    }
}

/// A chat model that answers with one AI message (text and/or tool calls)
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn invoke(&self, request: &ChatRequest) -> Result<AgentMessage, AgentError>;
}
