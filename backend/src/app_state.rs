//! Shared application state.
//!
//! Holds the settings, the API key override, the environment-variable
//! override layer and the activity log channel. Commands receive a reference
//! to `AppState`; everything inside is cheap to clone and safe to share
//! between tasks.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::api_keys::{ApiKeyManager, ANTHROPIC_API_KEY_ENV};
use crate::protocol::{AgentLogEvent, AgentLogEventType, LogLevel, LogSource};
use crate::settings::AppSettings;

/// Buffered activity log events per subscriber before the oldest are dropped
const LOG_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<AppSettings>>,
    pub api_keys: Arc<RwLock<ApiKeyManager>>,
    /// Values written through `set_env_var`; read before the real environment
    pub env_overrides: Arc<RwLock<HashMap<String, String>>>,
    logger: AgentLogger,
}

impl AppState {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            api_keys: Arc::new(RwLock::new(ApiKeyManager::new())),
            env_overrides: Arc::new(RwLock::new(HashMap::new())),
            logger: AgentLogger::new(),
        }
    }

    pub fn logger(&self) -> &AgentLogger {
        &self.logger
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<AgentLogEvent> {
        self.logger.subscribe()
    }

    /// Look up an environment variable, override layer first
    pub async fn env_var(&self, name: &str) -> Option<String> {
        if let Some(value) = self.env_overrides.read().await.get(name) {
            return Some(value.clone());
        }
        std::env::var(name).ok()
    }

    pub async fn set_env_var(&self, name: &str, value: &str) {
        self.env_overrides
            .write()
            .await
            .insert(name.to_string(), value.to_string());
    }

    pub async fn env_api_key(&self) -> Option<String> {
        self.env_var(ANTHROPIC_API_KEY_ENV)
            .await
            .filter(|k| !k.is_empty())
    }

    /// The key an agent run should use: override first, then the environment
    pub async fn current_api_key(&self) -> Option<String> {
        let env_key = self.env_api_key().await;
        self.api_keys.read().await.current_key(env_key.as_deref())
    }
}

/// Publishes activity log events to every subscriber and mirrors them to `tracing`
#[derive(Clone)]
pub struct AgentLogger {
    tx: broadcast::Sender<AgentLogEvent>,
}

impl AgentLogger {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentLogEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AgentLogEvent) {
        match event.level {
            LogLevel::Error => {
                tracing::error!("[AgentLog] [{}] {}", event.source.as_str(), event.message)
            }
            LogLevel::Warning => {
                tracing::warn!("[AgentLog] [{}] {}", event.source.as_str(), event.message)
            }
            LogLevel::Debug => {
                tracing::debug!("[AgentLog] [{}] {}", event.source.as_str(), event.message)
            }
            LogLevel::Info | LogLevel::Success => {
                tracing::info!("[AgentLog] [{}] {}", event.source.as_str(), event.message)
            }
        }
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn log(&self, level: LogLevel, source: LogSource, message: impl Into<String>) {
        self.emit(AgentLogEvent::new(level, source, message));
    }

    pub fn log_kind(
        &self,
        level: LogLevel,
        source: LogSource,
        kind: AgentLogEventType,
        message: impl Into<String>,
    ) {
        self.emit(AgentLogEvent::new(level, source, message).with_kind(kind));
    }

    pub fn log_data(
        &self,
        level: LogLevel,
        source: LogSource,
        kind: AgentLogEventType,
        message: impl Into<String>,
        data: Value,
    ) {
        self.emit(
            AgentLogEvent::new(level, source, message)
                .with_kind(kind)
                .with_data(data),
        );
    }
}

impl Default for AgentLogger {
    fn default() -> Self {
        Self::new()
    }
}
