//! Markdown rendering of agent results.
//!
//! - `format_json_as_markdown_table()` - JSON rows to a pipe table
//! - `format_agent_result_to_markdown()` - the consolidated analysis report
//! - `generate_error_response()` - the block shown when a run fails

use serde_json::Value;
use thiserror::Error;

use crate::protocol::AgentResult;

/// Why a JSON payload could not be shown as a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableFormatError {
    #[error("No tabular data available")]
    NoTabularData,
    #[error("Data is not in tabular format")]
    NotTabular,
    #[error("Error formatting data as table: {0}")]
    InvalidJson(String),
}

/// Render rows as a Markdown table. Headers come from the first row's keys.
pub fn markdown_table(rows: &[Value]) -> Result<String, TableFormatError> {
    let first = rows.first().ok_or(TableFormatError::NoTabularData)?;
    let headers: Vec<&String> = first
        .as_object()
        .ok_or(TableFormatError::NotTabular)?
        .keys()
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!(
        "| {} |",
        headers
            .iter()
            .map(|h| escape_cell(h))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    lines.push(format!(
        "| {} |",
        headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    ));

    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(h.as_str()).map(cell_text).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    Ok(lines.join("\n"))
}

/// String form of a JSON payload for the result viewer. Failures are
/// reported as their message instead of a table.
pub fn format_json_as_markdown_table(json: &str) -> String {
    let parsed = match serde_json::from_str::<Value>(json) {
        Ok(value) => value,
        Err(e) => return TableFormatError::InvalidJson(e.to_string()).to_string(),
    };

    let result = match &parsed {
        Value::Array(rows) => markdown_table(rows),
        _ => Err(TableFormatError::NoTabularData),
    };

    result.unwrap_or_else(|e| e.to_string())
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => return String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => number_text(n),
        other => other.to_string(),
    };
    escape_cell(&text)
}

/// Whole-valued REAL columns render like integers (`1.0` as `1`)
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        _ => n.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Build the consolidated report shown in the results pane
pub fn format_agent_result_to_markdown(result: &AgentResult) -> String {
    let mut markdown = String::from("# 📊 SQL Agent Analysis Summary\n\n");

    if !result.queries.is_empty() {
        markdown.push_str("## 🔍 SQL Queries Executed\n\n");
        for (i, query) in result.queries.iter().enumerate() {
            markdown.push_str(&format!("### Query {}:\n", i + 1));
            markdown.push_str(&format!("```sql\n{}\n```\n\n", query.query));
        }

        markdown.push_str("## 📋 Query Results\n\n");
        for (i, query) in result.queries.iter().enumerate() {
            markdown.push_str(&format!("### Result {}:\n\n", i + 1));

            let raw_json = serde_json::to_string_pretty(&query.result)
                .unwrap_or_else(|_| "[]".to_string());

            match markdown_table(&query.result) {
                Ok(table) => {
                    markdown.push_str(&table);
                    markdown.push_str("\n\n");
                    markdown.push_str(&format!("**Raw JSON:**\n```json\n{}\n```\n\n", raw_json));
                }
                Err(_) => {
                    markdown.push_str(&format!("```json\n{}\n```\n\n", raw_json));
                }
            }
        }
    }

    if !result.final_answer.is_empty() {
        markdown.push_str(&format!("## 🤖 Agent Response\n\n{}\n\n", result.final_answer));
    }

    markdown
}

pub fn generate_error_response(question: &str, error: &str) -> String {
    let error = if error.trim().is_empty() {
        "Unknown error occurred"
    } else {
        error
    };
    format!(
        "## ⚠️ Agent Error\n\n**Question:** \"{}\"\n\n**Error:** {}\n\n**Note:** Make sure the ANTHROPIC_API_KEY environment variable is set and the database is accessible.",
        question, error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QueryResult;
    use serde_json::json;

    #[test]
    fn test_whole_real_values_render_without_fraction() {
        let rows = vec![json!({"Total": 1.0, "Avg": 2.5, "Zero": -0.0, "Count": 3})];
        assert_eq!(
            markdown_table(&rows).unwrap(),
            "| Total | Avg | Zero | Count |\n| --- | --- | --- | --- |\n| 1 | 2.5 | 0 | 3 |"
        );
    }

    #[test]
    fn test_table_keeps_column_order_and_blanks_nulls() {
        let json = r#"[{"Name":"AC/DC","AlbumCount":2,"Note":null},{"Name":"Accept","AlbumCount":2}]"#;
        assert_eq!(
            format_json_as_markdown_table(json),
            "| Name | AlbumCount | Note |\n| --- | --- | --- |\n| AC/DC | 2 |  |\n| Accept | 2 |  |"
        );
    }

    #[test]
    fn test_table_error_messages() {
        assert_eq!(format_json_as_markdown_table("[]"), "No tabular data available");
        assert_eq!(format_json_as_markdown_table(r#"{"a":1}"#), "No tabular data available");
        assert_eq!(format_json_as_markdown_table("[1,2]"), "Data is not in tabular format");
        assert!(format_json_as_markdown_table("{oops")
            .starts_with("Error formatting data as table: "));
    }

    #[test]
    fn test_cells_escape_pipes_and_newlines() {
        let table = markdown_table(&[json!({"title": "Rock | Roll\nLive"})]).unwrap();
        assert!(table.ends_with("| Rock \\| Roll Live |"));
    }

    #[test]
    fn test_report_with_tabular_and_plain_results() {
        let result = AgentResult {
            queries: vec![
                QueryResult {
                    query: "SELECT COUNT(*) AS n FROM Album".to_string(),
                    result: vec![json!({"n": 347})],
                },
                QueryResult {
                    query: "SELECT nope".to_string(),
                    result: vec![json!("Error: no such column: nope")],
                },
            ],
            final_answer: "There are 347 albums.".to_string(),
        };

        let md = format_agent_result_to_markdown(&result);
        assert!(md.starts_with("# 📊 SQL Agent Analysis Summary\n\n## 🔍 SQL Queries Executed\n\n"));
        assert!(md.contains("### Query 1:\n```sql\nSELECT COUNT(*) AS n FROM Album\n```\n\n"));
        assert!(md.contains("### Result 1:\n\n| n |\n| --- |\n| 347 |\n\n**Raw JSON:**\n```json\n"));
        assert!(md.contains("### Result 2:\n\n```json\n[\n  \"Error: no such column: nope\"\n]\n```\n\n"));
        assert!(md.ends_with("## 🤖 Agent Response\n\nThere are 347 albums.\n\n"));
    }

    #[test]
    fn test_report_without_queries_or_answer() {
        let md = format_agent_result_to_markdown(&AgentResult::default());
        assert_eq!(md, "# 📊 SQL Agent Analysis Summary\n\n");
    }

    #[test]
    fn test_error_response() {
        let md = generate_error_response("How many albums?", "ANTHROPIC_API_KEY is not set");
        assert!(md.starts_with("## ⚠️ Agent Error\n\n**Question:** \"How many albums?\""));
        assert!(md.contains("**Error:** ANTHROPIC_API_KEY is not set"));
        assert!(md.contains("**Note:** Make sure the ANTHROPIC_API_KEY"));

        let unknown = generate_error_response("q", "");
        assert!(unknown.contains("**Error:** Unknown error occurred"));
    }
}
