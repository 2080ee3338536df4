//! Centralized path resolution for configuration files.
//!
//! | Purpose | Linux | macOS | Windows |
//! |---------|-------|-------|---------|
//! | Config | `~/.config/sql-agent-desk/` | `~/Library/Application Support/sql-agent-desk/` | `%APPDATA%\sql-agent-desk\` |

use std::path::{Path, PathBuf};

/// Application name used in directory paths
const APP_NAME: &str = "sql-agent-desk";

/// Settings file name inside the config directory
const SETTINGS_FILE: &str = "settings.json";

/// Get the configuration directory (for settings.json).
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| fallback_base_dir().join("config"))
}

/// Full path of the persisted settings file
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILE)
}

/// Fallback base directory when platform dirs are unavailable.
///
/// Tries `~/.sql-agent-desk/`, then `./.sql-agent-desk/`.
fn fallback_base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".sql-agent-desk"))
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".sql-agent-desk")
        })
}

/// Normalize a user-supplied database path.
///
/// Trims whitespace and drops a leading `./` so relative paths resolve the same
/// way regardless of how the front end spelled them. Absolute paths (Unix or
/// Windows drive-letter) are returned unchanged.
pub fn resolve_database_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if Path::new(trimmed).is_absolute() || trimmed.contains(":\\") {
        return PathBuf::from(trimmed);
    }
    PathBuf::from(trimmed.strip_prefix("./").unwrap_or(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_path_is_inside_config_dir() {
        let path = get_settings_path();
        assert!(path.starts_with(get_config_dir()));
        assert!(path.ends_with("settings.json"));
    }

    #[test]
    fn test_resolve_database_path() {
        assert_eq!(resolve_database_path("./Chinook.db"), PathBuf::from("Chinook.db"));
        assert_eq!(resolve_database_path("  data/app.db "), PathBuf::from("data/app.db"));
        assert_eq!(resolve_database_path("C:\\data\\app.db"), PathBuf::from("C:\\data\\app.db"));
        #[cfg(unix)]
        assert_eq!(resolve_database_path("/tmp/app.db"), PathBuf::from("/tmp/app.db"));
    }
}
