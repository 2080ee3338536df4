//! `info-sql`: CREATE statements and sample rows for the requested tables.

use crate::actors::DatabaseHandle;
use crate::error::AgentError;

pub const INFO_SQL_TOOL: &str = "info-sql";

pub const DESCRIPTION: &str = "Input to this tool is a comma-separated list of tables, output is the schema and sample rows for those tables. Be sure that the tables actually exist by calling list-tables-sql first! Example Input: \"table1, table2, table3.\"";

pub async fn execute(db: &DatabaseHandle, input: &str) -> Result<String, AgentError> {
    let tables = parse_table_list(input);
    tracing::debug!("[InfoSql] Describing {:?}", tables);
    db.table_info(tables).await
}

/// Split "a, b, c." into table names. Blank input means every table.
pub fn parse_table_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|t| t.trim().trim_end_matches('.').trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
