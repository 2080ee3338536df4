use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::paths;

pub const DEFAULT_DATABASE_PATH: &str = "./Chinook.db";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// SQLite file the agent queries when the caller does not name one
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Row cap the agent prompt asks for unless the question names one
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Row cap used by the single-shot query chain
    #[serde(default = "default_chain_top_k")]
    pub chain_top_k: usize,
    #[serde(default = "default_dialect")]
    pub dialect: String,
    /// Maximum number of graph steps (model calls + tool batches) per run
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries for rate-limited or overloaded LLM requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Simulated latency of the mock agent service
    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_top_k() -> usize {
    5
}

fn default_chain_top_k() -> usize {
    10
}

fn default_dialect() -> String {
    "SQLite".to_string()
}

fn default_recursion_limit() -> usize {
    25
}

fn default_anthropic_base_url() -> String {
    DEFAULT_ANTHROPIC_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_mock_delay_ms() -> u64 {
    2000
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            top_k: default_top_k(),
            chain_top_k: default_chain_top_k(),
            dialect: default_dialect(),
            recursion_limit: default_recursion_limit(),
            anthropic_base_url: default_anthropic_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            mock_delay_ms: default_mock_delay_ms(),
        }
    }
}

/// Load settings from the default config file
pub async fn load_settings() -> AppSettings {
    load_settings_from(&paths::get_settings_path()).await
}

/// Load settings from a specific file, falling back to defaults on any problem
pub async fn load_settings_from(config_path: &Path) -> AppSettings {
    match fs::read_to_string(config_path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(settings) => {
                tracing::info!("[Settings] Loaded from {:?}", config_path);
                settings
            }
            Err(e) => {
                tracing::warn!("[Settings] Failed to parse settings: {}, using defaults", e);
                AppSettings::default()
            }
        },
        Err(e) => {
            tracing::debug!(
                "[Settings] No config file found at {:?}: {}, using defaults",
                config_path,
                e
            );
            AppSettings::default()
        }
    }
}

/// Save settings to the default config file
pub async fn save_settings(settings: &AppSettings) -> Result<(), String> {
    save_settings_to(settings, &paths::get_settings_path()).await
}

/// Save settings to a specific file, creating parent directories as needed
pub async fn save_settings_to(settings: &AppSettings, config_path: &Path) -> Result<(), String> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    fs::write(config_path, contents)
        .await
        .map_err(|e| format!("Failed to write settings: {}", e))?;

    tracing::info!("[Settings] Saved to {:?}", config_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_agent_configuration() {
        let settings = AppSettings::default();
        assert_eq!(settings.database_path, "./Chinook.db");
        assert_eq!(settings.model, "claude-3-5-sonnet-20240620");
        assert_eq!(settings.temperature, 0.0);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.chain_top_k, 10);
        assert_eq!(settings.dialect, "SQLite");
        assert_eq!(settings.recursion_limit, 25);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"database_path": "/data/sales.db", "top_k": 8}"#;
        let settings: AppSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.database_path, "/data/sales.db");
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.max_retries, 2);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = AppSettings::default();
        settings.model = "claude-test".to_string();
        settings.recursion_limit = 10;

        save_settings_to(&settings, &path).await.unwrap();
        let loaded = load_settings_from(&path).await;
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let loaded = load_settings_from(&path).await;
        assert_eq!(loaded, AppSettings::default());
    }
}
