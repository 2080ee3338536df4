//! Extraction of executed SQL and its results from the agent step stream.
//!
//! The agent conversation mixes planning text, schema lookups and query
//! execution. `QueryCollector` watches the steps as they arrive and keeps
//! only what the user cares about:
//!
//! - the SQL the agent ran through `query-sql`, paired with its rows
//! - the final natural-language answer
//!
//! A `query-sql` result is paired with the input of the call that produced it
//! (matched by tool-call id). When the id is unknown, the most recent query
//! seen in a `query-sql` or `query-checker` call is used instead.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::protocol::{AgentMessage, AgentResult, AgentStep, QueryResult};
use crate::tools::{QUERY_CHECKER_TOOL, QUERY_SQL_TOOL};

/// Something the collector noticed while observing a step, used for the activity log
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// A SQL statement appeared in a `query-sql` or `query-checker` call
    QueryGenerated { query: String },
    /// A `query-sql` result is being paired with its query
    QueryExecuting { query: String },
    /// The result was captured. `row_count` is `None` when the output was not a JSON array.
    QueryCaptured {
        query: String,
        row_count: Option<usize>,
        json: bool,
    },
    /// The model replied without tool calls
    FinalAnswer,
}

#[derive(Debug, Default)]
pub struct QueryCollector {
    current_query: Option<String>,
    queries_by_call: HashMap<String, String>,
    queries: Vec<QueryResult>,
    final_answer: String,
}

impl QueryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one step and report what was extracted from it
    pub fn observe(&mut self, step: &AgentStep) -> Vec<StepEvent> {
        let mut events = Vec::new();

        match &step.message {
            AgentMessage::Ai {
                content,
                tool_calls,
            } => {
                if tool_calls.is_empty() {
                    self.final_answer = content.clone();
                    events.push(StepEvent::FinalAnswer);
                }

                for call in tool_calls {
                    if call.name != QUERY_SQL_TOOL && call.name != QUERY_CHECKER_TOOL {
                        continue;
                    }
                    let Some(query) = call.input() else {
                        continue;
                    };

                    self.current_query = Some(query.to_string());
                    if call.name == QUERY_SQL_TOOL {
                        self.queries_by_call
                            .insert(call.id.clone(), query.to_string());
                    }
                    events.push(StepEvent::QueryGenerated {
                        query: query.to_string(),
                    });
                }
            }
            AgentMessage::Tool {
                tool_call_id,
                name,
                content,
                ..
            } if name == QUERY_SQL_TOOL => {
                let paired = self.queries_by_call.remove(tool_call_id);
                let Some(query) = paired.or_else(|| self.current_query.clone()) else {
                    return events;
                };

                events.push(StepEvent::QueryExecuting {
                    query: query.clone(),
                });

                let (result, row_count, json) = parse_tool_result(content);
                events.push(StepEvent::QueryCaptured {
                    query: query.clone(),
                    row_count,
                    json,
                });

                self.queries.push(QueryResult { query, result });
                self.current_query = None;
            }
            _ => {}
        }

        events
    }

    pub fn queries(&self) -> &[QueryResult] {
        &self.queries
    }

    pub fn finish(self) -> AgentResult {
        AgentResult {
            queries: self.queries,
            final_answer: self.final_answer,
        }
    }
}

/// Interpret `query-sql` output: a JSON array is used as-is, any other JSON
/// value becomes a one-element list, and plain text becomes `[{"result": text}]`.
///
/// Returns the rows, the array length when the output was an array, and whether
/// the output parsed as JSON at all.
pub fn parse_tool_result(content: &str) -> (Vec<Value>, Option<usize>, bool) {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(rows)) => {
            let count = rows.len();
            (rows, Some(count), true)
        }
        Ok(other) => (vec![other], None, true),
        Err(_) => (vec![json!({ "result": content })], None, false),
    }
}

/// Run a complete step list through a fresh collector
pub fn extract_agent_result(steps: &[AgentStep]) -> AgentResult {
    let mut collector = QueryCollector::new();
    for step in steps {
        collector.observe(step);
    }
    collector.finish()
}
