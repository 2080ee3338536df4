//! Anthropic API key management.
//!
//! The key comes from one of two places: an in-memory override set from the
//! front end, or the `ANTHROPIC_API_KEY` environment variable. The override
//! always wins. The environment lookup is passed in by the caller so the
//! command layer can route it through its env-var override table.

use serde::{Deserialize, Serialize};

/// Environment variable holding the Anthropic key
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Placeholder shown for keys too short to partially reveal
const MASK_PLACEHOLDER: &str = "••••••••";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeySource {
    Env,
    Override,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyStatus {
    pub has_env_key: bool,
    pub has_override_key: bool,
    pub is_valid: bool,
    pub source: ApiKeySource,
    /// The active key, masked for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_key: Option<String>,
}

/// Shown when a non-blank override fails `validate_api_key_format`
pub const INVALID_KEY_FORMAT_MESSAGE: &str =
    "Invalid API key format. Should start with 'sk-ant-' and be 50+ characters.";

#[derive(Debug, Default, Clone)]
pub struct ApiKeyManager {
    override_key: Option<String>,
}

impl ApiKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report where the active key would come from.
    pub fn status(&self, env_key: Option<&str>) -> ApiKeyStatus {
        let has_env_key = env_key.map(|k| !k.is_empty()).unwrap_or(false);
        let has_override_key = self.override_key.is_some();

        let source = if has_override_key {
            ApiKeySource::Override
        } else if has_env_key {
            ApiKeySource::Env
        } else {
            ApiKeySource::None
        };

        ApiKeyStatus {
            has_env_key,
            has_override_key,
            is_valid: has_env_key || has_override_key,
            source,
            masked_key: self.current_key(env_key).map(|k| mask_api_key(&k)),
        }
    }

    /// Set the override key. A blank key clears the override.
    pub fn set_override(&mut self, api_key: &str) {
        let trimmed = api_key.trim();
        self.override_key = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    pub fn clear_override(&mut self) {
        self.override_key = None;
    }

    pub fn override_key(&self) -> Option<&str> {
        self.override_key.as_deref()
    }

    /// The key the agent should use: override first, then the environment.
    pub fn current_key(&self, env_key: Option<&str>) -> Option<String> {
        self.override_key
            .clone()
            .or_else(|| env_key.filter(|k| !k.is_empty()).map(str::to_string))
    }
}

/// Mask a key for display, keeping the first and last four characters.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    if chars.len() < 8 {
        return MASK_PLACEHOLDER.to_string();
    }

    let start: String = chars[..4].iter().collect();
    let end: String = chars[chars.len() - 4..].iter().collect();
    let middle = "•".repeat(std::cmp::max(4, chars.len() - 8));

    format!("{}{}{}", start, middle, end)
}

/// Loose shape check for Anthropic keys (`sk-ant-` prefix, reasonable length).
pub fn validate_api_key_format(api_key: &str) -> bool {
    let trimmed = api_key.trim();
    trimmed.starts_with("sk-ant-") && trimmed.len() > 50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_without_any_key() {
        let manager = ApiKeyManager::new();
        let status = manager.status(None);
        assert!(!status.has_env_key);
        assert!(!status.has_override_key);
        assert!(!status.is_valid);
        assert_eq!(status.source, ApiKeySource::None);
    }

    #[test]
    fn test_override_takes_precedence_over_env() {
        let mut manager = ApiKeyManager::new();
        manager.set_override("  sk-ant-override  ");

        let status = manager.status(Some("sk-ant-env"));
        assert!(status.has_env_key);
        assert!(status.has_override_key);
        assert_eq!(status.source, ApiKeySource::Override);
        assert_eq!(
            manager.current_key(Some("sk-ant-env")).as_deref(),
            Some("sk-ant-override")
        );
    }

    #[test]
    fn test_blank_override_clears() {
        let mut manager = ApiKeyManager::new();
        manager.set_override("sk-ant-abc");
        manager.set_override("   ");
        assert_eq!(manager.override_key(), None);
        assert_eq!(manager.status(Some("sk-ant-env")).source, ApiKeySource::Env);
    }

    #[test]
    fn test_clear_override_falls_back_to_env() {
        let mut manager = ApiKeyManager::new();
        manager.set_override("sk-ant-abc");
        manager.clear_override();
        assert_eq!(
            manager.current_key(Some("sk-ant-env")).as_deref(),
            Some("sk-ant-env")
        );
        assert_eq!(manager.current_key(Some("")), None);
    }

    #[test]
    fn test_status_masks_active_key_and_uses_camel_case() {
        let mut manager = ApiKeyManager::new();
        assert_eq!(manager.status(None).masked_key, None);

        manager.set_override("sk-ant-1234567890");
        let status = manager.status(Some("sk-ant-env-key"));
        assert_eq!(status.masked_key.as_deref(), Some("sk-a•••••••••7890"));

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["hasEnvKey"], true);
        assert_eq!(value["hasOverrideKey"], true);
        assert_eq!(value["isValid"], true);
        assert_eq!(value["maskedKey"], "sk-a•••••••••7890");
        assert!(value.get("has_env_key").is_none());
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "••••••••");
        assert_eq!(mask_api_key(""), "••••••••");
        // 8 chars: middle is still at least four bullets
        assert_eq!(mask_api_key("abcdwxyz"), "abcd••••wxyz");
        assert_eq!(mask_api_key("sk-ant-1234567890"), "sk-a•••••••••7890");
    }

    #[test]
    fn test_validate_api_key_format() {
        let good = format!("sk-ant-{}", "a".repeat(60));
        assert!(validate_api_key_format(&good));
        assert!(validate_api_key_format(&format!("  {}  ", good)));
        assert!(!validate_api_key_format("sk-ant-short"));
        assert!(!validate_api_key_format(&format!("sk-{}", "a".repeat(60))));
    }
}
