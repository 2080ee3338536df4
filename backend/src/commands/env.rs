//! Environment variable commands.
//!
//! Writes land in the override layer of `AppState`; the process environment
//! itself is never modified.

use crate::app_state::AppState;

pub async fn get_env_var(state: &AppState, name: &str) -> Option<String> {
    state.env_var(name).await
}

pub async fn set_env_var(state: &AppState, name: &str, value: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Environment variable name cannot be empty".to_string());
    }
    state.set_env_var(name, value).await;
    tracing::debug!("[Env] Set {}", name);
    Ok(())
}
