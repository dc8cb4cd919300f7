//! State-derived virtual tables: read `DebuggerState` directly, no protocol
//! round-trip beyond `vars`'s single `getProperties`/`variables` call.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::query::parser::{filter_value, Expr};
use crate::session::Session;

use super::{TableData, VirtualTable};

pub struct FramesTable;

#[async_trait]
impl VirtualTable for FramesTable {
    fn name(&self) -> &'static str {
        "frames"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["index", "frame_id", "function", "file", "line", "col", "url"]);
        for (i, f) in state.call_frames.iter().enumerate() {
            data.rows.push(vec![
                json!(i),
                json!(f.frame_id),
                json!(f.function),
                json!(f.file),
                json!(f.line),
                json!(f.col),
                json!(f.url),
            ]);
        }
        Ok(data)
    }
}

pub struct ScopesTable;

#[async_trait]
impl VirtualTable for ScopesTable {
    fn name(&self) -> &'static str {
        "scopes"
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let frame_index = filter_value(filter, "frame_id").and_then(|l| l.as_f64()).unwrap_or(0.0) as usize;
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["frame_id", "index", "name", "type", "object_id"]);
        if let Some(frame) = state.call_frames.get(frame_index) {
            for (i, scope) in frame.scope_chain.iter().enumerate() {
                data.rows.push(vec![
                    json!(frame.frame_id),
                    json!(i),
                    json!(scope.get("name").cloned().unwrap_or(Value::Null)),
                    json!(scope.get("type").cloned().unwrap_or(Value::Null)),
                    json!(scope
                        .get("object")
                        .and_then(|o| o.get("objectId"))
                        .cloned()
                        .unwrap_or(Value::Null)),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct VarsTable;

#[async_trait]
impl VirtualTable for VarsTable {
    fn name(&self) -> &'static str {
        "vars"
    }

    /// Defaults to frame 0, skips the global scope, maps each property via a
    /// single `Runtime.getProperties`/`variables` call, and formats values as
    /// `value`, `[ClassName]`, or `[Function: name]`.
    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let frame_index = filter_value(filter, "frame_id").and_then(|l| l.as_f64()).unwrap_or(0.0) as usize;

        let object_id = {
            let state = session.state().await;
            let state = state.read().await;
            let Some(frame) = state.call_frames.get(frame_index) else {
                return Ok(TableData::new(vec!["name", "value", "type"]));
            };
            frame
                .scope_chain
                .iter()
                .find(|s| s.get("type").and_then(|t| t.as_str()) != Some("global"))
                .and_then(|s| s.get("object"))
                .and_then(|o| o.get("objectId"))
                .and_then(|v| v.as_str())
                .map(String::from)
        };

        let Some(object_id) = object_id else {
            return Ok(TableData::new(vec!["name", "value", "type"]));
        };

        let response = session
            .send("Runtime.getProperties", Some(json!({"objectId": object_id, "ownProperties": true})))
            .await?;

        let mut data = TableData::new(vec!["name", "value", "type"]);
        if let Some(props) = response.get("result").and_then(|r| r.as_array()) {
            for prop in props {
                let name = prop.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string();
                let value = prop.get("value").cloned().unwrap_or(Value::Null);
                let (formatted, ty) = format_property_value(&value);
                data.rows.push(vec![json!(name), json!(formatted), json!(ty)]);
            }
        }
        Ok(data)
    }
}

/// Formats a CDP `RemoteObject` as `value`, `[ClassName]`, or
/// `[Function: name]`, matching the display convention of the rest of the
/// row-oriented tables.
fn format_property_value(value: &Value) -> (String, String) {
    let ty = value.get("type").and_then(|t| t.as_str()).unwrap_or("undefined").to_string();
    let subtype = value.get("subtype").and_then(|s| s.as_str());

    // A `null` local is reported as `{type: "object", subtype: "null", value: null}`;
    // without this it would render as `[Object]` instead of a literal null.
    if subtype == Some("null") {
        return ("null".to_string(), "null".to_string());
    }

    let display_ty = subtype.unwrap_or(ty.as_str()).to_string();

    match ty.as_str() {
        "function" => {
            let name = value
                .get("description")
                .and_then(|d| d.as_str())
                .and_then(|d| d.split('(').next())
                .map(str::trim)
                .unwrap_or("anonymous");
            (format!("[Function: {name}]"), display_ty)
        }
        "object" => {
            let class = value.get("className").and_then(|c| c.as_str()).unwrap_or("Object");
            (format!("[{class}]"), display_ty)
        }
        _ => {
            let rendered = value
                .get("value")
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| value.get("description").and_then(|d| d.as_str()).unwrap_or("undefined").to_string());
            (rendered, display_ty)
        }
    }
}

pub struct ThisTable;

#[async_trait]
impl VirtualTable for ThisTable {
    fn name(&self) -> &'static str {
        "this"
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let frame_index = filter_value(filter, "frame_id").and_then(|l| l.as_f64()).unwrap_or(0.0) as usize;
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["frame_id", "object_id"]);
        if let Some(frame) = state.call_frames.get(frame_index) {
            data.rows.push(vec![json!(frame.frame_id), json!(frame.this_object_id)]);
        }
        Ok(data)
    }
}

pub struct BreakpointsTable;

#[async_trait]
impl VirtualTable for BreakpointsTable {
    fn name(&self) -> &'static str {
        "breakpoints"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["id", "file", "line", "condition", "hits", "enabled"]);
        for bp in state.breakpoints.values() {
            data.rows.push(vec![
                json!(bp.id),
                json!(bp.file),
                json!(bp.line),
                json!(bp.condition),
                json!(bp.hits),
                json!(bp.enabled),
            ]);
        }
        Ok(data)
    }
}

pub struct ScriptsTable;

#[async_trait]
impl VirtualTable for ScriptsTable {
    fn name(&self) -> &'static str {
        "scripts"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["id", "file", "url", "lines", "is_module"]);
        for s in state.scripts.values() {
            data.rows.push(vec![json!(s.id), json!(s.file), json!(s.url), json!(s.lines), json!(s.is_module)]);
        }
        Ok(data)
    }
}

pub struct ConsoleTable;

#[async_trait]
impl VirtualTable for ConsoleTable {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["ts", "level", "text"]);
        for c in state.console.iter() {
            data.rows.push(vec![json!(c.ts), json!(c.level), json!(c.text)]);
        }
        Ok(data)
    }
}

pub struct ExceptionsTable;

#[async_trait]
impl VirtualTable for ExceptionsTable {
    fn name(&self) -> &'static str {
        "exceptions"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["ts", "text", "stack"]);
        for e in state.exceptions.iter() {
            data.rows.push(vec![json!(e.ts), json!(e.text), json!(e.stack)]);
        }
        Ok(data)
    }
}

pub struct AsyncFramesTable;

#[async_trait]
impl VirtualTable for AsyncFramesTable {
    fn name(&self) -> &'static str {
        "async_frames"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["id", "function", "file", "line", "parent_id", "description"]);
        for f in &state.async_stack {
            data.rows.push(vec![
                json!(f.id),
                json!(f.function),
                json!(f.file),
                json!(f.line),
                json!(f.parent_id),
                json!(f.description),
            ]);
        }
        Ok(data)
    }
}

pub struct ThreadsTable;

#[async_trait]
impl VirtualTable for ThreadsTable {
    fn name(&self) -> &'static str {
        "threads"
    }

    /// State-first: returns the DAP thread list if populated, else falls
    /// back to issuing a live `threads` protocol request.
    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let mut data = TableData::new(vec!["id", "active"]);
        let (threads, active) = {
            let state = session.state().await;
            let state = state.read().await;
            (state.dap.threads.clone(), state.dap.active_thread_id)
        };

        if !threads.is_empty() {
            for id in threads {
                data.rows.push(vec![json!(id), json!(Some(id) == active)]);
            }
            return Ok(data);
        }

        if let Ok(response) = session.send("threads", None).await {
            if let Some(list) = response.get("threads").and_then(|t| t.as_array()) {
                for t in list {
                    let id = t.get("id").and_then(|i| i.as_i64()).unwrap_or_default();
                    data.rows.push(vec![json!(id), json!(Some(id) == active)]);
                }
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_subtype_renders_as_literal_null_not_object() {
        let value = json!({"type": "object", "subtype": "null", "value": null});
        assert_eq!(format_property_value(&value), ("null".to_string(), "null".to_string()));
    }

    #[test]
    fn object_without_subtype_renders_as_class_name() {
        let value = json!({"type": "object", "className": "Request"});
        assert_eq!(format_property_value(&value), ("[Request]".to_string(), "object".to_string()));
    }

    #[test]
    fn object_with_array_subtype_prefers_subtype_for_the_type_column() {
        let value = json!({"type": "object", "subtype": "array", "className": "Array"});
        assert_eq!(format_property_value(&value), ("[Array]".to_string(), "array".to_string()));
    }

    #[test]
    fn string_value_renders_plainly() {
        let value = json!({"type": "string", "value": "alice"});
        assert_eq!(format_property_value(&value), ("alice".to_string(), "string".to_string()));
    }
}
