//! Database Actor - owns one SQLite database for the duration of an agent run.
//!
//! This actor handles:
//! - Listing the tables the agent may query
//! - Rendering table info (CREATE statement + sample rows) for the `info-sql` tool
//! - Executing SQL and returning rows as JSON objects in column order
//!
//! Every operation opens its own connection on a blocking thread, so the
//! async runtime never waits on SQLite.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::AgentError;
use crate::protocol::DatabaseValidation;

/// Number of sample rows shown per table by `table_info`
const SAMPLE_ROWS: usize = 3;

/// Messages for the Database Actor
#[derive(Debug)]
pub enum DatabaseMsg {
    /// List user tables, sorted by name
    ListTables {
        respond_to: oneshot::Sender<Result<Vec<String>, String>>,
    },
    /// Describe the named tables (all tables when empty)
    TableInfo {
        tables: Vec<String>,
        respond_to: oneshot::Sender<Result<String, String>>,
    },
    /// Execute a SQL statement
    RunQuery {
        sql: String,
        respond_to: oneshot::Sender<Result<Vec<Value>, String>>,
    },
}

/// Database Actor
pub struct DatabaseActor {
    rx: mpsc::Receiver<DatabaseMsg>,
    db_path: PathBuf,
}

impl DatabaseActor {
    pub fn new(rx: mpsc::Receiver<DatabaseMsg>, db_path: PathBuf) -> Self {
        Self { rx, db_path }
    }

    /// Run the actor's message loop until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("[DatabaseActor] Started for {:?}", self.db_path);

        while let Some(msg) = self.rx.recv().await {
            match msg {
                DatabaseMsg::ListTables { respond_to } => {
                    let result = self.blocking(|conn| list_tables_sync(conn)).await;
                    let _ = respond_to.send(result);
                }
                DatabaseMsg::TableInfo { tables, respond_to } => {
                    let result = self
                        .blocking(move |conn| table_info_sync(conn, &tables))
                        .await;
                    let _ = respond_to.send(result);
                }
                DatabaseMsg::RunQuery { sql, respond_to } => {
                    let result = self.blocking(move |conn| run_query_sync(conn, &sql)).await;
                    let _ = respond_to.send(result);
                }
            }
        }

        tracing::debug!("[DatabaseActor] Stopped for {:?}", self.db_path);
    }

    /// Open a connection on a blocking thread and run `work` against it
    async fn blocking<T, F>(&self, work: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, String> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = open_existing(&db_path, false).map_err(|e| e.to_string())?;
            work(&conn)
        })
        .await
        .map_err(|e| format!("Database task panicked: {}", e))?
    }
}

/// Handle to a running Database Actor.
///
/// Dropping (or closing) the handle shuts the actor down.
pub struct DatabaseHandle {
    tx: mpsc::Sender<DatabaseMsg>,
    task: JoinHandle<()>,
    path: PathBuf,
}

impl DatabaseHandle {
    /// Check that `path` is an existing SQLite database and start an actor for it.
    pub async fn connect(path: &Path) -> Result<Self, AgentError> {
        let db_path = path.to_path_buf();
        let probe_path = db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_existing(&probe_path, false)?;
            list_tables_sync(&conn).map(|_| ()).map_err(AgentError::Database)
        })
        .await
        .map_err(|e| AgentError::Database(format!("Database task panicked: {}", e)))?
        .map_err(|e| AgentError::DatabaseInit {
            path: db_path.display().to_string(),
            message: match e {
                AgentError::Sqlite(inner) => inner.to_string(),
                other => other.to_string(),
            },
        })?;

        let (tx, rx) = mpsc::channel(16);
        let actor = DatabaseActor::new(rx, db_path.clone());
        let task = tokio::spawn(actor.run());

        Ok(Self {
            tx,
            task,
            path: db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, AgentError> {
        let (respond_to, rx) = oneshot::channel();
        self.send(DatabaseMsg::ListTables { respond_to }).await?;
        rx.await
            .map_err(|_| AgentError::ActorClosed("Database"))?
            .map_err(AgentError::Database)
    }

    pub async fn table_info(&self, tables: Vec<String>) -> Result<String, AgentError> {
        let (respond_to, rx) = oneshot::channel();
        self.send(DatabaseMsg::TableInfo { tables, respond_to }).await?;
        rx.await
            .map_err(|_| AgentError::ActorClosed("Database"))?
            .map_err(AgentError::Database)
    }

    pub async fn run_query(&self, sql: &str) -> Result<Vec<Value>, AgentError> {
        let (respond_to, rx) = oneshot::channel();
        self.send(DatabaseMsg::RunQuery {
            sql: sql.to_string(),
            respond_to,
        })
        .await?;
        rx.await
            .map_err(|_| AgentError::ActorClosed("Database"))?
            .map_err(AgentError::Database)
    }

    /// Stop the actor and wait for it to finish its current message
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!("[DatabaseActor] Task ended abnormally: {}", e);
        }
    }

    async fn send(&self, msg: DatabaseMsg) -> Result<(), AgentError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| AgentError::ActorClosed("Database"))
    }
}

// ============ Synchronous SQLite helpers ============

/// Open an existing database file. Never creates a new file.
fn open_existing(path: &Path, read_only: bool) -> Result<Connection, AgentError> {
    let mode = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(
        path,
        mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

fn list_tables_sync(conn: &Connection) -> Result<Vec<String>, String> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .map_err(|e| format!("Failed to list tables: {}", e))?;

    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| format!("Failed to list tables: {}", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to read table name: {}", e))?;

    Ok(names)
}

fn table_info_sync(conn: &Connection, requested: &[String]) -> Result<String, String> {
    let available = list_tables_sync(conn)?;

    let tables: Vec<String> = if requested.is_empty() {
        available.clone()
    } else {
        let missing: Vec<&str> = requested
            .iter()
            .filter(|t| !available.iter().any(|a| a.eq_ignore_ascii_case(t)))
            .map(|t| t.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "Wrong target table name(s): {}. Available tables: {}",
                missing.join(", "),
                available.join(", ")
            ));
        }
        requested
            .iter()
            .filter_map(|t| available.iter().find(|a| a.eq_ignore_ascii_case(t)).cloned())
            .collect()
    };

    let mut sections = Vec::with_capacity(tables.len());
    for table in &tables {
        let create_sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| format!("Failed to read schema for {}: {}", table, e))?;

        let sample = sample_rows_sync(conn, table)?;
        sections.push(format!("{}\n\n{}", create_sql.trim(), sample));
    }

    Ok(sections.join("\n\n"))
}

fn sample_rows_sync(conn: &Connection, table: &str) -> Result<String, String> {
    let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), SAMPLE_ROWS);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| format!("Failed to sample {}: {}", table, e))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = columns.len();

    let mut lines = vec![
        format!("{} rows from {} table:", SAMPLE_ROWS, table),
        columns.join("\t"),
    ];

    let mut rows = stmt
        .query([])
        .map_err(|e| format!("Failed to sample {}: {}", table, e))?;
    while let Some(row) = rows
        .next()
        .map_err(|e| format!("Failed to fetch sample row: {}", e))?
    {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value = row
                .get_ref(i)
                .map(sqlite_to_json)
                .map_err(|e| format!("Failed to read sample value: {}", e))?;
            cells.push(match value {
                Value::Null => "NULL".to_string(),
                Value::String(s) => s,
                other => other.to_string(),
            });
        }
        lines.push(cells.join("\t"));
    }

    Ok(format!("/*\n{}\n*/", lines.join("\n")))
}

fn run_query_sync(conn: &Connection, sql: &str) -> Result<Vec<Value>, String> {
    let mut stmt = conn.prepare(sql).map_err(|e| e.to_string())?;

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query([]).map_err(|e| e.to_string())?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(|e| e.to_string())? {
        let mut object = Map::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(|e| e.to_string())?;
            object.insert(column.clone(), sqlite_to_json(value));
        }
        out.push(Value::Object(object));
    }

    Ok(out)
}

/// Convert a SQLite value to JSON
fn sqlite_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Check a database path without starting an actor.
///
/// Opens the file read-only so validation never modifies it.
pub fn validate_database_file(raw_path: &str) -> DatabaseValidation {
    let invalid = |error: String| DatabaseValidation {
        valid: false,
        path: raw_path.to_string(),
        tables: Vec::new(),
        error: Some(error),
    };

    if raw_path.trim().is_empty() {
        return invalid("Database path is empty".to_string());
    }

    let path = crate::paths::resolve_database_path(raw_path);
    if !path.exists() {
        return invalid(format!("Database file not found: {}", path.display()));
    }
    if !path.is_file() {
        return invalid(format!("Path is not a file: {}", path.display()));
    }

    let tables = open_existing(&path, true)
        .map_err(|e| e.to_string())
        .and_then(|conn| list_tables_sync(&conn));

    match tables {
        Ok(tables) => DatabaseValidation {
            valid: true,
            path: raw_path.to_string(),
            tables,
            error: None,
        },
        Err(e) => invalid(format!("Not a valid SQLite database: {}", e)),
    }
}
