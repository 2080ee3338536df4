//! Agentic loop execution for the ReAct SQL agent.
//!
//! The loop repeatedly calls the model with the whole conversation, executes
//! any tool calls it asks for, appends the results, and continues until the
//! model answers without tool calls.
//!
//! Every message appended to the conversation (starting with the user
//! question) is published as an `AgentStep` on the step channel, so callers
//! can observe the run while it is in progress.
//!
//! ## Key Types
//! - `AgenticLoopConfig` - System prompt and recursion limit
//! - `AgenticLoopAction` - Result of action detection (tool calls vs final response)
//!
//! ## Key Functions
//! - `run_agentic_loop()` - Main loop execution
//! - `detect_agentic_loop_action()` - Determine if a reply contains tool calls

use tokio::sync::mpsc;

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest};
use crate::protocol::{AgentMessage, AgentStep, ToolCall};
use crate::tools::SqlToolkit;

// ============================================================================
// Types
// ============================================================================

/// Result of deciding what the loop should do with a model reply.
#[derive(Debug, PartialEq)]
pub enum AgenticLoopAction {
    /// No tool calls, this is the final response
    Final { response: String },
    /// Tool calls that should be executed before the next model call
    ToolCalls { calls: Vec<ToolCall> },
}

#[derive(Debug, Clone)]
pub struct AgenticLoopConfig {
    pub system_prompt: String,
    /// Maximum graph steps; one model call or one tool batch is one step
    pub recursion_limit: usize,
}

/// Appends messages to the conversation and publishes each one as a step
struct StepPublisher {
    tx: mpsc::Sender<AgentStep>,
    next_index: usize,
}

impl StepPublisher {
    async fn publish(&mut self, conversation: &mut Vec<AgentMessage>, message: AgentMessage) {
        self.next_index += 1;
        let step = AgentStep {
            index: self.next_index,
            message: message.clone(),
        };
        conversation.push(message);
        // A dropped receiver only means nobody is watching
        let _ = self.tx.send(step).await;
    }
}

// ============================================================================
// Action Detection
// ============================================================================

pub fn detect_agentic_loop_action(reply: &AgentMessage) -> AgenticLoopAction {
    let calls = reply.tool_calls();
    if calls.is_empty() {
        AgenticLoopAction::Final {
            response: reply.content().to_string(),
        }
    } else {
        AgenticLoopAction::ToolCalls {
            calls: calls.to_vec(),
        }
    }
}

fn check_recursion_limit(steps: &mut usize, limit: usize) -> Result<(), AgentError> {
    *steps += 1;
    if *steps > limit {
        tracing::warn!("[AgenticLoop] Recursion limit ({}) reached, stopping", limit);
        return Err(AgentError::RecursionLimit(limit));
    }
    Ok(())
}

// ============================================================================
// Main Loop
// ============================================================================

/// Run the agent on one question and return the full conversation.
///
/// Tool calls within one model reply run sequentially in the order given.
pub async fn run_agentic_loop(
    model: &dyn ChatModel,
    toolkit: &SqlToolkit,
    config: &AgenticLoopConfig,
    question: &str,
    step_tx: mpsc::Sender<AgentStep>,
) -> Result<Vec<AgentMessage>, AgentError> {
    let tools = toolkit.definitions();
    let mut conversation: Vec<AgentMessage> = Vec::new();
    let mut publisher = StepPublisher {
        tx: step_tx,
        next_index: 0,
    };
    let mut steps = 0usize;

    publisher
        .publish(&mut conversation, AgentMessage::human(question))
        .await;

    loop {
        check_recursion_limit(&mut steps, config.recursion_limit)?;

        let request = ChatRequest {
            system: Some(config.system_prompt.clone()),
            messages: conversation.clone(),
            tools: tools.clone(),
            tool_choice: None,
        };

        tracing::debug!(
            "[AgenticLoop] Calling {} (step {}, {} messages)",
            model.model_name(),
            steps,
            conversation.len()
        );
        let reply = model.invoke(&request).await?;
        let action = detect_agentic_loop_action(&reply);
        publisher.publish(&mut conversation, reply).await;

        let calls = match action {
            AgenticLoopAction::Final { response } => {
                tracing::info!(
                    "[AgenticLoop] No tool calls detected, loop complete ({} chars)",
                    response.len()
                );
                break;
            }
            AgenticLoopAction::ToolCalls { calls } => calls,
        };

        check_recursion_limit(&mut steps, config.recursion_limit)?;
        tracing::info!("[AgenticLoop] Found {} tool call(s)", calls.len());

        for call in calls {
            let output = toolkit.execute(&call).await;
            publisher
                .publish(
                    &mut conversation,
                    AgentMessage::Tool {
                        tool_call_id: call.id,
                        name: call.name,
                        content: output.content,
                        is_error: output.is_error,
                    },
                )
                .await;
        }
    }

    Ok(conversation)
}
