//! Anthropic Messages API client.
//!
//! The Messages API differs from OpenAI-style chat in a few ways that matter here:
//! - `system` is a top-level field, not a message
//! - tool calls arrive as `tool_use` content blocks on the assistant message
//! - tool results go back as `tool_result` blocks inside a *user* message, and
//!   all results for one assistant turn must share that message
//! - `max_tokens` is required

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::sleep;

use super::{ChatModel, ChatRequest, ToolChoice};
use crate::error::AgentError;
use crate::protocol::{AgentMessage, ToolCall};
use crate::settings::AppSettings;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_PATH: &str = "/v1/messages";
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Connection and sampling parameters for the client
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout: Duration,
    pub retry_base_delay: Duration,
}

impl AnthropicConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            base_url: settings.anthropic_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries,
            timeout: Duration::from_secs(settings.request_timeout_secs),
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url, MESSAGES_PATH)
    }

    /// Send one request, retrying rate-limit, overload and server errors
    async fn post_with_retry(&self, body: &Value) -> Result<Value, AgentError> {
        let url = self.endpoint();
        let mut delay = self.config.retry_base_delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let can_retry = attempt <= self.config.max_retries;

            let response = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.json::<Value>().await?);
                    }

                    let text = resp.text().await.unwrap_or_default();
                    let message = extract_error_message(&text);

                    if is_retryable_status(status.as_u16()) && can_retry {
                        tracing::warn!(
                            "[Anthropic] HTTP {} on attempt {}: {} (retrying in {:?})",
                            status,
                            attempt,
                            message,
                            delay
                        );
                    } else {
                        return Err(AgentError::Llm(format!(
                            "Anthropic API error ({}): {}",
                            status, message
                        )));
                    }
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && can_retry => {
                    tracing::warn!(
                        "[Anthropic] Request failed on attempt {}: {} (retrying in {:?})",
                        attempt,
                        e,
                        delay
                    );
                }
                Err(e) => return Err(AgentError::Http(e)),
            }

            sleep(delay).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: &ChatRequest) -> Result<AgentMessage, AgentError> {
        let body = build_request_body(&self.config, request);
        tracing::debug!(
            "[Anthropic] POST {} ({} messages, {} tools)",
            self.endpoint(),
            request.messages.len(),
            request.tools.len()
        );

        let response = self.post_with_retry(&body).await?;
        let message = parse_response(&response)?;

        tracing::debug!(
            "[Anthropic] Reply: {} chars, {} tool calls",
            message.content().len(),
            message.tool_calls().len()
        );
        Ok(message)
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || status == 529 || (500..600).contains(&status)
}

/// Pull `error.message` out of an Anthropic error body, or fall back to the raw text
fn extract_error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| text.to_string())
}

/// Build the JSON body for `POST /v1/messages`
pub fn build_request_body(config: &AnthropicConfig, request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": to_anthropic_messages(&request.messages),
    });

    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        body["system"] = json!(system);
    }

    if !request.tools.is_empty() {
        body["tools"] = Value::Array(
            request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect(),
        );
    }

    if let Some(choice) = &request.tool_choice {
        body["tool_choice"] = match choice {
            ToolChoice::Auto => json!({"type": "auto"}),
            ToolChoice::Any => json!({"type": "any"}),
            ToolChoice::Tool(name) => json!({"type": "tool", "name": name}),
        };
    }

    body
}

/// Convert the conversation into Anthropic messages.
///
/// Consecutive tool messages are folded into one user message of
/// `tool_result` blocks.
pub fn to_anthropic_messages(messages: &[AgentMessage]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(messages.len());
    let mut last_was_tool = false;

    for message in messages {
        match message {
            AgentMessage::Human { content } => {
                out.push(json!({"role": "user", "content": content}));
                last_was_tool = false;
            }
            AgentMessage::Ai {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(json!({"type": "text", "text": content}));
                }
                for call in tool_calls {
                    let input = if call.args.is_object() {
                        call.args.clone()
                    } else {
                        json!({})
                    };
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": input,
                    }));
                }
                out.push(json!({"role": "assistant", "content": blocks}));
                last_was_tool = false;
            }
            AgentMessage::Tool {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let mut block = json!({
                    "type": "tool_result",
                    "tool_use_id": tool_call_id,
                    "content": content,
                });
                if *is_error {
                    block["is_error"] = json!(true);
                }

                let appended = if last_was_tool {
                    out.last_mut()
                        .and_then(|m| m["content"].as_array_mut())
                        .map(|blocks| blocks.push(block.clone()))
                        .is_some()
                } else {
                    false
                };
                if !appended {
                    out.push(json!({"role": "user", "content": [block]}));
                }
                last_was_tool = true;
            }
        }
    }

    out
}

/// Turn a Messages API response into an AI message
pub fn parse_response(body: &Value) -> Result<AgentMessage, AgentError> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| AgentError::Llm("Response has no content array".to_string()))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block["id"].as_str().unwrap_or_default().to_string();
                let name = block["name"]
                    .as_str()
                    .ok_or_else(|| AgentError::Llm("tool_use block without a name".to_string()))?
                    .to_string();
                tool_calls.push(ToolCall {
                    id,
                    name,
                    args: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            _ => {}
        }
    }

    Ok(AgentMessage::ai(text, tool_calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolDefinition;
    use httpmock::prelude::*;

    fn test_config(base_url: String) -> AnthropicConfig {
        AnthropicConfig {
            base_url,
            model: "claude-test".to_string(),
            temperature: 0.0,
            max_tokens: 256,
            max_retries: 1,
            timeout: Duration::from_secs(5),
            retry_base_delay: Duration::from_millis(10),
        }
    }

    fn tool_exchange() -> Vec<AgentMessage> {
        vec![
            AgentMessage::human("How many albums?"),
            AgentMessage::ai(
                "Let me look.",
                vec![
                    ToolCall {
                        id: "t1".to_string(),
                        name: "list-tables-sql".to_string(),
                        args: json!({}),
                    },
                    ToolCall {
                        id: "t2".to_string(),
                        name: "info-sql".to_string(),
                        args: json!({"input": "Album"}),
                    },
                ],
            ),
            AgentMessage::Tool {
                tool_call_id: "t1".to_string(),
                name: "list-tables-sql".to_string(),
                content: "Album, Artist".to_string(),
                is_error: false,
            },
            AgentMessage::Tool {
                tool_call_id: "t2".to_string(),
                name: "info-sql".to_string(),
                content: "Error: nope".to_string(),
                is_error: true,
            },
        ]
    }

    #[test]
    fn test_tool_results_share_one_user_message() {
        let messages = to_anthropic_messages(&tool_exchange());
        assert_eq!(messages.len(), 3);

        assert_eq!(messages[1]["role"], "assistant");
        let assistant_blocks = messages[1]["content"].as_array().unwrap();
        assert_eq!(assistant_blocks[0]["type"], "text");
        assert_eq!(assistant_blocks[1]["type"], "tool_use");
        assert_eq!(assistant_blocks[2]["input"]["input"], "Album");

        assert_eq!(messages[2]["role"], "user");
        let results = messages[2]["content"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["tool_use_id"], "t1");
        assert!(results[0].get("is_error").is_none());
        assert_eq!(results[1]["is_error"], true);
    }

    #[test]
    fn test_request_body_shape() {
        let config = test_config("http://localhost".to_string());
        let request = ChatRequest {
            system: Some("You are an agent".to_string()),
            messages: vec![AgentMessage::human("hi")],
            tools: vec![ToolDefinition {
                name: "query-sql".to_string(),
                description: "run sql".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            tool_choice: Some(ToolChoice::Tool("query-sql".to_string())),
        };

        let body = build_request_body(&config, &request);
        assert_eq!(body["model"], "claude-test");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["system"], "You are an agent");
        assert_eq!(body["tools"][0]["name"], "query-sql");
        assert_eq!(body["tool_choice"]["type"], "tool");
        assert_eq!(body["tool_choice"]["name"], "query-sql");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_request_body_omits_empty_optionals() {
        let config = test_config("http://localhost".to_string());
        let body = build_request_body(&config, &ChatRequest::prompt("hello"));
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_parse_response_with_text_and_tool_use() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Checking tables."},
                {"type": "tool_use", "id": "toolu_1", "name": "list-tables-sql", "input": {"input": ""}}
            ],
            "stop_reason": "tool_use"
        });

        let message = parse_response(&body).unwrap();
        assert_eq!(message.content(), "Checking tables.");
        assert_eq!(message.tool_calls().len(), 1);
        assert_eq!(message.tool_calls()[0].id, "toolu_1");
        assert_eq!(message.tool_calls()[0].name, "list-tables-sql");
    }

    #[test]
    fn test_parse_response_requires_content() {
        let err = parse_response(&json!({"type": "message"})).unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(extract_error_message(body), "invalid x-api-key");
        assert_eq!(extract_error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_invoke_sends_headers_and_parses_reply() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "sk-ant-test")
                    .header("anthropic-version", "2023-06-01");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "content": [{"type": "text", "text": "There are 347 albums."}],
                        "stop_reason": "end_turn"
                    }));
            })
            .await;

        let client = AnthropicClient::new("sk-ant-test", test_config(server.base_url())).unwrap();
        let reply = client.invoke(&ChatRequest::prompt("How many albums?")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.content(), "There are 347 albums.");
        assert!(reply.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_does_not_retry_client_errors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(401).json_body(json!({
                    "type": "error",
                    "error": {"type": "authentication_error", "message": "invalid x-api-key"}
                }));
            })
            .await;

        let client = AnthropicClient::new("bad", test_config(server.base_url())).unwrap();
        let err = client.invoke(&ChatRequest::prompt("hi")).await.unwrap_err();

        mock.assert_hits_async(1).await;
        let text = err.to_string();
        assert!(text.contains("401"), "{}", text);
        assert!(text.contains("invalid x-api-key"), "{}", text);
    }

    #[tokio::test]
    async fn test_invoke_retries_overloaded_then_gives_up() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(529).json_body(json!({
                    "type": "error",
                    "error": {"type": "overloaded_error", "message": "Overloaded"}
                }));
            })
            .await;

        let client = AnthropicClient::new("sk-ant-test", test_config(server.base_url())).unwrap();
        let err = client.invoke(&ChatRequest::prompt("hi")).await.unwrap_err();

        // One initial attempt plus max_retries = 1
        mock.assert_hits_async(2).await;
        assert!(err.to_string().contains("Overloaded"));
    }
}
