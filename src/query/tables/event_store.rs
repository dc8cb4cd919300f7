//! Event-store-derived virtual tables: row sources backed by `EventStore`
//! rather than live session state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::query::parser::{filter_value, Expr};
use crate::session::Session;
use crate::store::EventStore;

use super::{TableData, VirtualTable};

const RECENT_EVENT_LIMIT: i64 = 1500;

/// The event store persists `data` as a JSON-encoded TEXT column; parse it
/// back into a structured value for table consumers.
fn parsed_data(row: &std::collections::HashMap<String, Value>) -> Value {
    match row.get("data") {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn row_from_event(row: &std::collections::HashMap<String, Value>) -> Vec<Value> {
    vec![
        row.get("id").cloned().unwrap_or(Value::Null),
        row.get("ts").cloned().unwrap_or(Value::Null),
        row.get("source").cloned().unwrap_or(Value::Null),
        row.get("category").cloned().unwrap_or(Value::Null),
        row.get("method").cloned().unwrap_or(Value::Null),
        parsed_data(row),
        row.get("session_id").cloned().unwrap_or(Value::Null),
    ]
}

pub struct EventsTable {
    store: Arc<EventStore>,
}

impl EventsTable {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VirtualTable for EventsTable {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn fetch(&self, _session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let rows = self
            .store
            .query("SELECT id, ts, source, category, method, data, session_id FROM events ORDER BY id DESC LIMIT 5000", vec![])
            .await?;
        let mut data = TableData::new(vec!["id", "ts", "source", "category", "method", "data", "session_id"]);
        data.rows = rows.iter().map(row_from_event).collect();
        Ok(data)
    }
}

/// `cdp`/`cdp_messages` (the latter is a plain alias): events recorded with
/// `source = 'cdp'`.
pub struct CdpTable {
    store: Arc<EventStore>,
    name: &'static str,
}

impl CdpTable {
    pub fn new(store: Arc<EventStore>, name: &'static str) -> Self {
        Self { store, name }
    }
}

#[async_trait]
impl VirtualTable for CdpTable {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let rows = self
            .store
            .query(
                "SELECT id, ts, source, category, method, data, session_id FROM events WHERE source = ?1 ORDER BY id DESC LIMIT 5000",
                vec![json!("cdp")],
            )
            .await?;
        let mut data = TableData::new(vec!["id", "ts", "source", "category", "method", "data", "session_id"]);
        data.rows = rows.iter().map(row_from_event).collect();
        Ok(data)
    }
}

/// Distinct `(source, session_id)` pairs observed in the event store, with
/// first/last timestamps and a running count — a coarse connection history.
pub struct ConnectionsTable {
    store: Arc<EventStore>,
}

impl ConnectionsTable {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VirtualTable for ConnectionsTable {
    fn name(&self) -> &'static str {
        "connections"
    }

    async fn fetch(&self, _session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let rows = self
            .store
            .query(
                "SELECT source, session_id, COUNT(*) as count, MIN(ts) as first_ts, MAX(ts) as last_ts \
                 FROM events GROUP BY source, session_id ORDER BY last_ts DESC",
                vec![],
            )
            .await?;
        let mut data = TableData::new(vec!["source", "session_id", "count", "first_ts", "last_ts"]);
        for row in rows {
            data.rows.push(vec![
                row.get("source").cloned().unwrap_or(Value::Null),
                row.get("session_id").cloned().unwrap_or(Value::Null),
                row.get("count").cloned().unwrap_or(Value::Null),
                row.get("first_ts").cloned().unwrap_or(Value::Null),
                row.get("last_ts").cloned().unwrap_or(Value::Null),
            ]);
        }
        Ok(data)
    }
}

#[derive(Clone, PartialEq)]
enum Detail {
    Compact,
    Standard,
    Full,
}

impl Detail {
    fn truncate_len(&self) -> Option<usize> {
        match self {
            Detail::Compact => Some(160),
            Detail::Standard => Some(400),
            Detail::Full => None,
        }
    }
}

/// Truncates on a char boundary, never a byte index — `summary` is built
/// from target-controlled text and may contain multibyte UTF-8.
fn truncate_summary(summary: &str, len: Option<usize>) -> String {
    match len {
        Some(len) if summary.chars().count() > len => {
            let split = summary.char_indices().nth(len).map(|(i, _)| i).unwrap_or(summary.len());
            format!("{}…", &summary[..split])
        }
        _ => summary.to_string(),
    }
}

/// Produces classified rows over the most recent `RECENT_EVENT_LIMIT`
/// events: stream derived from category/method, severity from text
/// heuristics, optional compaction of adjacent identical non-error rows.
pub struct TimelineTable {
    store: Arc<EventStore>,
}

impl TimelineTable {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VirtualTable for TimelineTable {
    fn name(&self) -> &'static str {
        "timeline"
    }

    async fn fetch(&self, _session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let detail = match filter_value(filter, "detail").and_then(|l| l.as_str()) {
            Some("standard") => Detail::Standard,
            Some("full") => Detail::Full,
            _ => Detail::Compact,
        };
        let include = filter_value(filter, "include").and_then(|l| l.as_str()).unwrap_or("all").to_string();
        let window_ms = filter_value(filter, "window_ms").and_then(|l| l.as_f64());

        let raw = self
            .store
            .query(
                "SELECT id, ts, source, category, method, data, session_id FROM events ORDER BY id DESC LIMIT ?1",
                vec![json!(RECENT_EVENT_LIMIT)],
            )
            .await?;

        let mut classified: Vec<TimelineRow> = raw.iter().rev().map(classify).collect();

        if let Some(window_ms) = window_ms {
            let anchor = classified
                .iter()
                .rev()
                .find(|r| r.severity == "error")
                .map(|r| r.ts)
                .or_else(|| classified.last().map(|r| r.ts));
            if let Some(anchor) = anchor {
                let lower = anchor - window_ms as i64;
                classified.retain(|r| r.ts >= lower && r.ts <= anchor);
            }
        }

        if include != "all" {
            classified.retain(|r| row_matches_include(r, &include));
        }

        if detail == Detail::Compact {
            classified = coalesce(classified);
        }

        let mut data = TableData::new(vec![
            "id",
            "ts",
            "stream",
            "phase",
            "entity",
            "method",
            "summary",
            "severity",
            "duration_ms",
            "session_id",
            "raw_ref",
        ]);
        for row in classified {
            let summary = truncate_summary(&row.summary, detail.truncate_len());
            data.rows.push(vec![
                json!(row.id),
                json!(row.ts),
                json!(row.stream),
                json!(row.phase),
                json!(row.entity),
                json!(row.method),
                json!(summary),
                json!(row.severity),
                json!(row.duration_ms),
                json!(row.session_id),
                json!(row.raw_ref),
            ]);
        }
        Ok(data)
    }
}

#[derive(Clone)]
struct TimelineRow {
    id: i64,
    ts: i64,
    stream: String,
    phase: String,
    entity: String,
    method: String,
    summary: String,
    severity: String,
    duration_ms: Option<i64>,
    session_id: Option<String>,
    raw_ref: String,
}

fn classify(row: &std::collections::HashMap<String, Value>) -> TimelineRow {
    let id = row.get("id").and_then(|v| v.as_i64()).unwrap_or(0);
    let ts = row.get("ts").and_then(|v| v.as_i64()).unwrap_or(0);
    let category = row.get("category").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let method = row.get("method").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let session_id = row.get("session_id").and_then(|v| v.as_str()).map(String::from);
    let data = parsed_data(row);

    let stream = if method == "Runtime.exceptionThrown" {
        "exception".to_string()
    } else if let Some(prefix) = method.split('.').next() {
        match prefix {
            "Network" => "network".to_string(),
            "Page" => "page".to_string(),
            "Debugger" => "debugger".to_string(),
            "Log" => "console".to_string(),
            other => other.to_ascii_lowercase(),
        }
    } else {
        category.clone()
    };

    let entity = data
        .get("url")
        .or_else(|| data.get("requestId"))
        .or_else(|| data.get("scriptId"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let error_text = data
        .get("exceptionDetails")
        .and_then(|e| e.get("text"))
        .or_else(|| data.get("errorText"))
        .and_then(|v| v.as_str());

    let severity = if error_text.is_some() || stream == "exception" {
        "error"
    } else if method.to_ascii_lowercase().contains("warn") {
        "warn"
    } else if category == "protocol" {
        "trace"
    } else {
        "info"
    };

    let summary = error_text.map(String::from).unwrap_or_else(|| {
        if entity.is_empty() {
            method.clone()
        } else {
            format!("{method} {entity}")
        }
    });

    TimelineRow {
        id,
        ts,
        stream,
        phase: "event".to_string(),
        entity,
        method,
        summary,
        severity: severity.to_string(),
        duration_ms: None,
        session_id,
        raw_ref: format!("events:{id}"),
    }
}

fn row_matches_include(row: &TimelineRow, include: &str) -> bool {
    match include {
        "errors" => row.severity == "error",
        "network" => row.stream == "network",
        "debugger" => row.stream == "debugger",
        "browser" => matches!(row.stream.as_str(), "page" | "console" | "network"),
        _ => true,
    }
}

/// Coalesces adjacent non-error rows sharing `(stream, phase, method, entity,
/// summary, session_id)` into one row with an `(xN)` suffix, `raw_ref`
/// rewritten to the covered id range.
fn coalesce(rows: Vec<TimelineRow>) -> Vec<TimelineRow> {
    let mut out: Vec<TimelineRow> = Vec::with_capacity(rows.len());
    for row in rows {
        if row.severity != "error" {
            if let Some(last) = out.last_mut() {
                if last.severity != "error"
                    && last.stream == row.stream
                    && last.phase == row.phase
                    && last.method == row.method
                    && last.entity == row.entity
                    && strip_count_suffix(&last.summary) == row.summary
                {
                    let count = count_suffix(&last.summary) + 1;
                    last.summary = format!("{} (x{count})", strip_count_suffix(&last.summary));
                    let min_id = last.raw_ref.strip_prefix("events:").and_then(|r| r.split('-').next()).unwrap_or("0");
                    last.raw_ref = format!("events:{min_id}-{}", row.id);
                    continue;
                }
            }
        }
        out.push(row);
    }
    out
}

fn strip_count_suffix(summary: &str) -> String {
    if let Some(idx) = summary.rfind(" (x") {
        if summary.ends_with(')') {
            return summary[..idx].to_string();
        }
    }
    summary.to_string()
}

fn count_suffix(summary: &str) -> usize {
    if let Some(idx) = summary.rfind(" (x") {
        if let Some(stripped) = summary[idx + 3..].strip_suffix(')') {
            return stripped.parse().unwrap_or(1);
        }
    }
    1
}
