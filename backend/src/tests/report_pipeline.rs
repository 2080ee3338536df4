//! From a recorded step stream to the rendered report and activity log.

use std::sync::Arc;

use super::harness::{call_reply, create_music_db, drain_logs, ScriptedModel};
use crate::app_state::AppState;
use crate::commands::agent::{run_sql_agent_with_model, subscribe_agent_log};
use crate::log_store::{render_line, LogStore};
use crate::markdown::format_agent_result_to_markdown;
use crate::protocol::{AgentMessage, AgentStep, LogSource};
use crate::settings::AppSettings;
use crate::step_extractor::extract_agent_result;

#[test]
fn test_recorded_stream_renders_report() {
    let steps: Vec<AgentStep> = vec![
        AgentMessage::human("Which artists have the most albums?"),
        call_reply("a", "list-tables-sql", ""),
        AgentMessage::Tool {
            tool_call_id: "a".to_string(),
            name: "list-tables-sql".to_string(),
            content: "Album, Artist".to_string(),
            is_error: false,
        },
        call_reply(
            "b",
            "query-sql",
            "SELECT ar.Name, COUNT(*) AS Albums FROM Album al JOIN Artist ar ON ar.ArtistId = al.ArtistId GROUP BY ar.Name ORDER BY Albums DESC LIMIT 5",
        ),
        AgentMessage::Tool {
            tool_call_id: "b".to_string(),
            name: "query-sql".to_string(),
            content: r#"[{"Name":"Iron Maiden","Albums":21},{"Name":"Led Zeppelin","Albums":14}]"#
                .to_string(),
            is_error: false,
        },
        AgentMessage::ai("Iron Maiden has the most albums (21).", vec![]),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, message)| AgentStep {
        index: i + 1,
        message,
    })
    .collect();

    let result = extract_agent_result(&steps);
    let md = format_agent_result_to_markdown(&result);

    assert!(md.contains("### Query 1:\n```sql\nSELECT ar.Name, COUNT(*) AS Albums"));
    assert!(md.contains(
        "| Name | Albums |\n| --- | --- |\n| Iron Maiden | 21 |\n| Led Zeppelin | 14 |"
    ));
    assert!(md.contains("**Raw JSON:**\n```json\n[\n  {\n    \"Name\": \"Iron Maiden\",\n    \"Albums\": 21\n  },"));
    assert!(md.ends_with("## 🤖 Agent Response\n\nIron Maiden has the most albums (21).\n\n"));
}

#[tokio::test]
async fn test_log_events_feed_the_log_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = create_music_db(dir.path());
    let state = AppState::new(AppSettings::default());
    let mut rx = subscribe_agent_log(&state);
    let model = Arc::new(ScriptedModel::new(vec![
        call_reply("t1", "query-sql", "SELECT Title FROM Album ORDER BY AlbumId"),
        AgentMessage::ai("Two albums.", vec![]),
    ]));

    run_sql_agent_with_model(&state, model, "List albums", db_path.to_str().unwrap()).await;

    let mut store = LogStore::new();
    for event in drain_logs(&mut rx) {
        store.add_from_event(&event);
    }

    let database_lines: Vec<String> = store
        .entries_for_source(LogSource::Database)
        .into_iter()
        .map(render_line)
        .collect();
    assert!(database_lines
        .iter()
        .any(|l| l.contains("[database] Query executed successfully {\"rowCount\":2")));
    assert!(database_lines
        .last()
        .unwrap()
        .ends_with("[database] Database connection closed"));
}
