//! Settings commands.

use std::path::Path;

use crate::app_state::AppState;
use crate::paths;
use crate::settings::{self, AppSettings};

/// Get current application settings
pub async fn get_settings(state: &AppState) -> AppSettings {
    state.settings.read().await.clone()
}

/// Save application settings to disk and update the in-memory copy
pub async fn save_app_settings(state: &AppState, new_settings: AppSettings) -> Result<(), String> {
    save_app_settings_to(state, new_settings, &paths::get_settings_path()).await
}

/// `save_app_settings` against an explicit settings file
pub async fn save_app_settings_to(
    state: &AppState,
    new_settings: AppSettings,
    config_path: &Path,
) -> Result<(), String> {
    settings::save_settings_to(&new_settings, config_path).await?;

    let mut guard = state.settings.write().await;
    *guard = new_settings;
    Ok(())
}

/// Change the default database path used when a run names none
pub async fn set_database_path(state: &AppState, db_path: &str) -> Result<(), String> {
    let trimmed = db_path.trim();
    if trimmed.is_empty() {
        return Err("Database path cannot be empty".to_string());
    }
    state.settings.write().await.database_path = trimmed.to_string();
    tracing::info!("[Settings] Database path set to {}", trimmed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_database_path_updates_state() {
        let state = AppState::new(AppSettings::default());
        set_database_path(&state, " /data/sales.db ").await.unwrap();
        assert_eq!(get_settings(&state).await.database_path, "/data/sales.db");
        assert!(set_database_path(&state, "").await.is_err());
    }

    #[tokio::test]
    async fn test_save_app_settings_persists_and_updates_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let state = AppState::new(AppSettings::default());
        let updated = AppSettings {
            database_path: "/data/sales.db".to_string(),
            top_k: 7,
            ..AppSettings::default()
        };

        save_app_settings_to(&state, updated.clone(), &path).await.unwrap();

        assert_eq!(get_settings(&state).await, updated);
        assert_eq!(settings::load_settings_from(&path).await, updated);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_settings() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail
        let path = dir.path().join("settings.json");
        std::fs::create_dir(&path).unwrap();
        let state = AppState::new(AppSettings::default());
        let updated = AppSettings {
            top_k: 9,
            ..AppSettings::default()
        };

        let err = save_app_settings_to(&state, updated, &path).await.unwrap_err();
        assert!(err.starts_with("Failed to write settings"), "{}", err);
        assert_eq!(get_settings(&state).await, AppSettings::default());
    }
}
