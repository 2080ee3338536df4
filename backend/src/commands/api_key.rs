//! API key commands.

use crate::api_keys::{validate_api_key_format, ApiKeyStatus, INVALID_KEY_FORMAT_MESSAGE};
use crate::app_state::AppState;

pub async fn get_api_key_status(state: &AppState) -> ApiKeyStatus {
    let env_key = state.env_api_key().await;
    state.api_keys.read().await.status(env_key.as_deref())
}

/// Set the override key. A blank key clears the override; a malformed one is rejected.
pub async fn set_api_key_override(state: &AppState, api_key: &str) -> Result<(), String> {
    if !api_key.trim().is_empty() && !validate_api_key_format(api_key) {
        tracing::warn!("[ApiKey] Rejected override key with invalid format");
        return Err(INVALID_KEY_FORMAT_MESSAGE.to_string());
    }

    let mut guard = state.api_keys.write().await;
    guard.set_override(api_key);
    if guard.override_key().is_some() {
        tracing::info!("[ApiKey] Override key set");
    } else {
        tracing::info!("[ApiKey] Blank override key, override cleared");
    }
    Ok(())
}

pub async fn clear_api_key_override(state: &AppState) -> Result<(), String> {
    state.api_keys.write().await.clear_override();
    tracing::info!("[ApiKey] Override key cleared");
    Ok(())
}

pub async fn get_current_api_key(state: &AppState) -> Option<String> {
    state.current_api_key().await
}
