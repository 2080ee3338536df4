//! `query-sql`: execute a statement and hand the rows back as a JSON array.

use crate::actors::DatabaseHandle;
use crate::error::AgentError;

pub const QUERY_SQL_TOOL: &str = "query-sql";

pub const DESCRIPTION: &str = "Input to this tool is a detailed and correct SQL query, output is a result from the database. If the query is not correct, an error message will be returned. If an error is returned, rewrite the query, check the query, and try again.";

/// Run `query`. SQL errors are returned as the output text `Error: <message>`
/// so the model can read them and retry.
pub async fn execute(db: &DatabaseHandle, query: &str) -> Result<String, AgentError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok("Error: SQL query cannot be empty".to_string());
    }

    tracing::info!("[QuerySql] Executing: {}", truncate_sql(query, 100));

    match db.run_query(query).await {
        Ok(rows) => {
            tracing::debug!("[QuerySql] {} rows", rows.len());
            Ok(serde_json::to_string(&rows)?)
        }
        Err(AgentError::Database(message)) => {
            tracing::info!("[QuerySql] Query failed: {}", message);
            Ok(format!("Error: {}", message))
        }
        Err(e) => Err(e),
    }
}

/// Shorten SQL for log lines
pub fn truncate_sql(sql: &str, max_chars: usize) -> String {
    let single_line = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_sql_collapses_whitespace() {
        assert_eq!(truncate_sql("SELECT *\n  FROM t", 100), "SELECT * FROM t");
        assert_eq!(truncate_sql("SELECT name FROM artists", 6), "SELECT...");
    }
}
