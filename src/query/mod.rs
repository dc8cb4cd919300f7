//! Query engine (spec §4.7) and virtual tables (spec §4.8): a small SQL
//! subset executed against live session state, CDP protocol requests, and
//! the event store.

pub mod engine;
pub mod parser;
pub mod tables;

use serde_json::{json, Value};

use crate::error::Result;
use crate::session::Session;

pub use engine::ResultSet;
pub use parser::Query;
pub use tables::TableRegistry;

/// Parse and execute `sql` against `session`, returning the rendered output:
/// JSON if the query ends in the `\j` sentinel, tab-separated values
/// otherwise.
pub async fn run(sql: &str, session: &Session, registry: &TableRegistry) -> Result<String> {
    let query = parser::parse(sql)?;
    let result = engine::execute(&query, session, registry).await?;
    Ok(if query.json_output {
        render_json(&result)
    } else {
        render_tsv(&result)
    })
}

fn render_tsv(result: &ResultSet) -> String {
    let mut out = String::new();
    out.push_str(&result.columns.join("\t"));
    out.push('\n');
    for row in &result.rows {
        let cells: Vec<String> = row.iter().map(cell_to_tsv).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn cell_to_tsv(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_json(result: &ResultSet) -> String {
    let rows: Vec<Value> = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = serde_json::Map::new();
            for (col, cell) in result.columns.iter().zip(row.iter()) {
                obj.insert(col.clone(), cell.clone());
            }
            Value::Object(obj)
        })
        .collect();
    json!(rows).to_string()
}
