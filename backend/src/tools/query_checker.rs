//! `query-checker`: have the LLM review a query before it is executed.

use regex::Regex;

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatRequest};
use crate::system_prompt::build_query_checker_prompt;

pub const QUERY_CHECKER_TOOL: &str = "query-checker";

pub const DESCRIPTION: &str = "Use this tool to double check if your query is correct before executing it. Always use this tool before executing a query with query-sql!";

pub async fn execute(llm: &dyn ChatModel, dialect: &str, query: &str) -> Result<String, AgentError> {
    let prompt = build_query_checker_prompt(dialect, query);
    let reply = llm.invoke(&ChatRequest::prompt(prompt)).await?;
    let checked = strip_code_fence(reply.content());
    tracing::debug!("[QueryChecker] {} -> {}", query, checked);
    Ok(checked)
}

lazy_static::lazy_static! {
    // Whole reply wrapped in one fence, optional language tag
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)^```[A-Za-z]*\s*\n?(.*?)\n?\s*```$").expect("code fence pattern is valid");
}

/// Unwrap a reply of the form ```sql ... ``` to the bare query
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|inner| inner.as_str().trim().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}
