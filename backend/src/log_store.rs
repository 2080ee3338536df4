//! In-memory activity log backing the agent log viewer.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::protocol::{AgentLogEvent, LogLevel, LogSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Default)]
pub struct LogStore {
    entries: Vec<LogEntry>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry stamped with the current time
    pub fn add_entry(
        &mut self,
        level: LogLevel,
        source: LogSource,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> &LogEntry {
        self.push(LogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            source,
            message: message.into(),
            data,
        })
    }

    /// Record an event received from the agent, keeping its timestamp
    pub fn add_from_event(&mut self, event: &AgentLogEvent) -> &LogEntry {
        self.push(LogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: event.timestamp,
            level: event.level,
            source: event.source,
            message: event.message.clone(),
            data: event.data.clone(),
        })
    }

    fn push(&mut self, entry: LogEntry) -> &LogEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for_source(&self, source: LogSource) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.source == source).collect()
    }
}

pub fn level_icon(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "ℹ️",
        LogLevel::Success => "✅",
        LogLevel::Warning => "⚠️",
        LogLevel::Error => "❌",
        LogLevel::Debug => "🔍",
    }
}

/// One line for a terminal activity log: icon, local time, source, message and compact data
pub fn render_line(entry: &LogEntry) -> String {
    let time = entry
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S%.3f");
    let mut line = format!(
        "{} {} [{}] {}",
        level_icon(entry.level),
        time,
        entry.source.as_str(),
        entry.message
    );
    if let Some(data) = &entry.data {
        match data {
            Value::String(s) => line.push_str(&format!(" {}", s)),
            other => line.push_str(&format!(" {}", other)),
        }
    }
    line
}
