//! Database commands.

use crate::actors::database_actor::validate_database_file;
use crate::protocol::DatabaseValidation;

/// Check that `db_path` names a readable SQLite database and list its tables
pub async fn validate_database(db_path: &str) -> DatabaseValidation {
    let raw = db_path.to_string();
    let validation = tokio::task::spawn_blocking(move || validate_database_file(&raw))
        .await
        .unwrap_or_else(|e| DatabaseValidation {
            valid: false,
            path: db_path.to_string(),
            tables: Vec::new(),
            error: Some(format!("Validation task failed: {}", e)),
        });

    if validation.valid {
        tracing::info!(
            "[Database] {} is valid ({} tables)",
            db_path,
            validation.tables.len()
        );
    } else {
        tracing::warn!(
            "[Database] {} is invalid: {}",
            db_path,
            validation.error.as_deref().unwrap_or("unknown error")
        );
    }
    validation
}
