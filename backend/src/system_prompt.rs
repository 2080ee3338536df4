//! Centralized prompt text for the SQL agent.
//!
//! Single source of truth for the agent system prompt, the query-chain prompt
//! and the query-checker prompt. Placeholders use `{name}` and are filled by
//! the builders below.

// ============ Templates ============

/// System prompt of the ReAct SQL agent
pub const SQL_AGENT_SYSTEM_PROMPT: &str = "\
You are an agent designed to interact with a SQL database.
Given an input question, create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer.
Unless the user specifies a specific number of examples they wish to obtain, always limit your query to at most {top_k} results.
You can order the results by a relevant column to return the most interesting examples in the database.
Never query for all the columns from a specific table, only ask for the relevant columns given the question.
You have access to tools for interacting with the database.
Only use the below tools. Only use the information returned by the below tools to construct your final answer.
You MUST double check your query before executing it. If you get an error while executing a query, rewrite the query and try again.

DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.

To start you should ALWAYS look at the tables in the database to see what you can query.
Do NOT skip this step.
Then you should query the schema of the most relevant tables.";

/// Prompt of the single-shot "generate SQL" chain
pub const SQL_QUERY_SYSTEM_PROMPT: &str = "\
Given an input question, create a syntactically correct {dialect} query to run to help find the answer. \
Unless the user specifies in his question a specific number of examples they wish to obtain, always limit your query to at most {top_k} results. \
You can order the results by a relevant column to return the most interesting examples in the database.

Never query for all the columns from a specific table, only ask for a the few relevant columns given the question.

Pay attention to use only the column names that you can see in the schema description. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.

Only use the following tables:
{table_info}

Question: {input}";

/// Prompt sent by the `query-checker` tool
pub const QUERY_CHECKER_PROMPT: &str = "\
{query}
Double check the {dialect} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.";

// ============ Builders ============

/// Replace each `{key}` in `template` with its value
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    // Single pass: substituted text is never scanned again
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                filled.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }
    filled.push_str(rest);
    filled
}

pub fn build_agent_system_prompt(dialect: &str, top_k: usize) -> String {
    fill_template(
        SQL_AGENT_SYSTEM_PROMPT,
        &[("dialect", dialect), ("top_k", &top_k.to_string())],
    )
}

pub fn build_query_chain_prompt(dialect: &str, top_k: usize, table_info: &str, question: &str) -> String {
    fill_template(
        SQL_QUERY_SYSTEM_PROMPT,
        &[
            ("dialect", dialect),
            ("top_k", &top_k.to_string()),
            ("table_info", table_info),
            ("input", question),
        ],
    )
}

/// The checker prompt names the dialect in lower case ("sqlite")
pub fn build_query_checker_prompt(dialect: &str, query: &str) -> String {
    let dialect = dialect.to_lowercase();
    fill_template(QUERY_CHECKER_PROMPT, &[("dialect", &dialect), ("query", query)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_prompt_is_fully_filled() {
        let prompt = build_agent_system_prompt("SQLite", 5);
        assert!(prompt.contains("syntactically correct SQLite query"));
        assert!(prompt.contains("at most 5 results"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn test_chain_prompt_includes_schema_and_question() {
        let prompt = build_query_chain_prompt(
            "SQLite",
            10,
            "CREATE TABLE Artist (ArtistId INTEGER)",
            "How many artists are there?",
        );
        assert!(prompt.contains("at most 10 results"));
        assert!(prompt.contains("Only use the following tables:\nCREATE TABLE Artist"));
        assert!(prompt.ends_with("Question: How many artists are there?"));
    }

    #[test]
    fn test_checker_prompt_leads_with_query() {
        let prompt = build_query_checker_prompt("SQLite", "SELECT {x} FROM t");
        assert!(prompt.starts_with("SELECT {x} FROM t\nDouble check the sqlite query above"));
        assert!(prompt.ends_with("just reproduce the original query."));
    }

    #[test]
    fn test_fill_template_replaces_every_occurrence() {
        assert_eq!(fill_template("{a}-{a}-{b}", &[("a", "1"), ("b", "2")]), "1-1-2");
    }

    #[test]
    fn test_fill_template_leaves_substituted_text_alone() {
        assert_eq!(
            fill_template("{a} {b} {unknown} {", &[("a", "{b}"), ("b", "x")]),
            "{b} x {unknown} {"
        );
    }

    #[test]
    fn test_chain_prompt_keeps_placeholders_in_sample_rows() {
        let table_info = "CREATE TABLE Note (Body TEXT)\n/*\nBody\n{input} and {top_k}\n*/";
        let prompt = build_query_chain_prompt("SQLite", 10, table_info, "What notes exist?");
        assert!(prompt.contains("{input} and {top_k}"));
        assert!(prompt.ends_with("Question: What notes exist?"));
        assert_eq!(prompt.matches("What notes exist?").count(), 1);
    }
}
