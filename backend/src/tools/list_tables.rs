use crate::actors::DatabaseHandle;
use crate::error::AgentError;

pub const LIST_TABLES_TOOL: &str = "list-tables-sql";

pub const DESCRIPTION: &str =
    "Input is an empty string, output is a comma-separated list of tables in the database.";

pub async fn execute(db: &DatabaseHandle) -> Result<String, AgentError> {
    Ok(db.list_tables().await?.join(", "))
}
