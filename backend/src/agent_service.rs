//! UI-facing agent services.
//!
//! `AgentService` is what the results pane talks to: a question goes in,
//! Markdown comes out. The SQL implementation drives the real agent through
//! the command layer; the mock implementation is used when no API key is
//! configured so the interface stays usable.

use async_trait::async_trait;
use std::time::Duration;

use crate::app_state::AppState;
use crate::commands::agent::run_sql_agent;
use crate::markdown::{format_agent_result_to_markdown, generate_error_response};
use crate::protocol::AgentResult;
use crate::settings::DEFAULT_DATABASE_PATH;

#[async_trait]
pub trait AgentService: Send + Sync {
    /// Answer `question` as a Markdown document. Never fails; errors are rendered.
    async fn process_question(&self, question: &str) -> String;

    /// Answer `question` with the raw queries and answer, when the service has them
    async fn process_question_structured(&self, question: &str) -> Option<AgentResult>;

    fn set_database_path(&mut self, path: &str);

    fn database_path(&self) -> &str;
}

// ============ SQL agent ============

pub struct SqlAgentService {
    state: AppState,
    db_path: String,
}

impl SqlAgentService {
    pub fn new(state: AppState) -> Self {
        Self::with_database(state, DEFAULT_DATABASE_PATH)
    }

    pub fn with_database(state: AppState, db_path: &str) -> Self {
        Self {
            state,
            db_path: db_path.to_string(),
        }
    }

    async fn run(&self, question: &str) -> Result<AgentResult, String> {
        let response = run_sql_agent(&self.state, question, &self.db_path).await;
        match (response.success, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(response
                .error
                .unwrap_or_else(|| "Unknown error occurred".to_string())),
        }
    }
}

#[async_trait]
impl AgentService for SqlAgentService {
    async fn process_question(&self, question: &str) -> String {
        match self.run(question).await {
            Ok(result) => format_agent_result_to_markdown(&result),
            Err(e) => {
                tracing::error!("[AgentService] Agent processing error: {}", e);
                generate_error_response(question, &e)
            }
        }
    }

    async fn process_question_structured(&self, question: &str) -> Option<AgentResult> {
        self.run(question).await.ok()
    }

    fn set_database_path(&mut self, path: &str) {
        self.db_path = path.to_string();
    }

    fn database_path(&self) -> &str {
        &self.db_path
    }
}

// ============ Mock ============

pub struct MockAgentService {
    delay: Duration,
    db_path: String,
}

impl MockAgentService {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            db_path: DEFAULT_DATABASE_PATH.to_string(),
        }
    }

    fn mock_response(&self, question: &str) -> String {
        format!(
            "## Response to: \"{}\"\n\n**Database:** {}\n\nThis is a mock async response that demonstrates the loading state. The agent is working properly and returning formatted content.\n\n### Sample Query:\n```sql\nSELECT * FROM customers WHERE name LIKE '%test%'\n```\n\n### Sample Results:\n\n| ID | Name | Email |\n|---|---|---|\n| 1 | Test User | test@example.com |\n| 2 | Another Test | another@test.com |",
            question, self.db_path
        )
    }
}

impl Default for MockAgentService {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn process_question(&self, question: &str) -> String {
        tokio::time::sleep(self.delay).await;
        self.mock_response(question)
    }

    async fn process_question_structured(&self, _question: &str) -> Option<AgentResult> {
        None
    }

    fn set_database_path(&mut self, path: &str) {
        self.db_path = path.to_string();
    }

    fn database_path(&self) -> &str {
        &self.db_path
    }
}

/// Pick the real agent when an API key is available, the mock otherwise
pub async fn create_agent_service(state: &AppState) -> Box<dyn AgentService> {
    let settings = state.settings.read().await.clone();

    if state.current_api_key().await.is_some() {
        Box::new(SqlAgentService::with_database(
            state.clone(),
            &settings.database_path,
        ))
    } else {
        tracing::warn!(
            "[AgentService] Using mock agent service. Set ANTHROPIC_API_KEY to use real agent."
        );
        let mut mock = MockAgentService::new(Duration::from_millis(settings.mock_delay_ms));
        mock.set_database_path(&settings.database_path);
        Box::new(mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AppSettings;

    #[tokio::test]
    async fn test_mock_names_question_and_database() {
        let mut service = MockAgentService::new(Duration::from_millis(1));
        service.set_database_path("/data/sales.db");

        let md = service.process_question("Top customers?").await;
        assert!(md.starts_with("## Response to: \"Top customers?\"\n\n**Database:** /data/sales.db"));
        assert!(md.contains("| 1 | Test User | test@example.com |"));
        assert!(service.process_question_structured("Top customers?").await.is_none());
    }

    #[tokio::test]
    async fn test_factory_falls_back_to_mock_without_key() {
        let mut settings = AppSettings::default();
        settings.mock_delay_ms = 1;
        let state = AppState::new(settings);
        // Shadow any key present in the test environment
        state.set_env_var("ANTHROPIC_API_KEY", "").await;

        let service = create_agent_service(&state).await;
        assert!(service
            .process_question("hello")
            .await
            .contains("This is a mock async response"));
    }

    #[tokio::test]
    async fn test_factory_uses_sql_service_with_key() {
        let state = AppState::new(AppSettings::default());
        state.api_keys.write().await.set_override("sk-ant-test");

        let service = create_agent_service(&state).await;
        assert_eq!(service.database_path(), "./Chinook.db");
    }

    #[tokio::test]
    async fn test_sql_service_renders_errors() {
        let state = AppState::new(AppSettings::default());
        state.set_env_var("ANTHROPIC_API_KEY", "").await;
        let service = SqlAgentService::with_database(state, "/nonexistent/db.sqlite");

        let md = service.process_question("How many albums?").await;
        assert!(md.starts_with("## ⚠️ Agent Error"));
        assert!(md.contains("ANTHROPIC_API_KEY is not set"));
    }
}
