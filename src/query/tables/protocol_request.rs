//! Protocol-request virtual tables: each row set costs at least one live
//! CDP round trip against the session's executor.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::query::parser::{filter_value, Expr};
use crate::session::Session;

use super::{TableData, VirtualTable};

pub struct PropsTable;

#[async_trait]
impl VirtualTable for PropsTable {
    fn name(&self) -> &'static str {
        "props"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["object_id"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let object_id = required_str(filter, "object_id")?;
        let response = session
            .send("Runtime.getProperties", Some(json!({"objectId": object_id, "ownProperties": true})))
            .await?;
        let mut data = TableData::new(vec!["name", "value", "type", "writable", "enumerable"]);
        if let Some(props) = response.get("result").and_then(|r| r.as_array()) {
            for prop in props {
                data.rows.push(vec![
                    prop.get("name").cloned().unwrap_or(Value::Null),
                    prop.get("value").and_then(|v| v.get("value")).cloned().unwrap_or(Value::Null),
                    prop.get("value").and_then(|v| v.get("type")).cloned().unwrap_or(Value::Null),
                    prop.get("writable").cloned().unwrap_or(Value::Null),
                    prop.get("enumerable").cloned().unwrap_or(Value::Null),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct ProtoTable;

#[async_trait]
impl VirtualTable for ProtoTable {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["object_id"]
    }

    /// Walks `[[Prototype]]` links until a null-subtype object is reached.
    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let mut object_id = required_str(filter, "object_id")?.to_string();
        let mut data = TableData::new(vec!["depth", "class_name", "object_id"]);
        let mut depth = 0i64;
        loop {
            let response = session
                .send("Runtime.getProperties", Some(json!({"objectId": object_id, "ownProperties": true})))
                .await?;
            let proto = response
                .get("internalProperties")
                .and_then(|p| p.as_array())
                .and_then(|props| props.iter().find(|p| p.get("name").and_then(|n| n.as_str()) == Some("[[Prototype]]")))
                .and_then(|p| p.get("value"));

            let Some(proto) = proto else { break };
            let subtype = proto.get("subtype").and_then(|s| s.as_str());
            if subtype == Some("null") || proto.get("objectId").is_none() {
                break;
            }
            let class_name = proto.get("className").and_then(|c| c.as_str()).unwrap_or("Object").to_string();
            let next_id = proto.get("objectId").and_then(|o| o.as_str()).unwrap_or_default().to_string();
            data.rows.push(vec![json!(depth), json!(class_name), json!(next_id)]);
            depth += 1;
            object_id = next_id;
            if depth > 64 {
                break;
            }
        }
        Ok(data)
    }
}

pub struct SourceTable;

#[async_trait]
impl VirtualTable for SourceTable {
    fn name(&self) -> &'static str {
        "source"
    }

    /// Requires `file` or `script_id` (an OR requirement, validated by hand
    /// since the registry's required-filter check only models AND-of-columns).
    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let script_id = if let Some(id) = filter_value(filter, "script_id").and_then(|l| l.as_str()) {
            Some(id.to_string())
        } else if let Some(file) = filter_value(filter, "file").and_then(|l| l.as_str()) {
            let state = session.state().await;
            let state = state.read().await;
            state
                .scripts
                .values()
                .find(|s| s.file.as_deref() == Some(file) || s.url.as_deref() == Some(file))
                .map(|s| s.id.clone())
        } else {
            return Err(Error::MissingRequiredFilter("file or script_id".into()));
        };

        let Some(script_id) = script_id else {
            return Ok(TableData::new(vec!["line", "text"]));
        };

        let response = session.send("Debugger.getScriptSource", Some(json!({"scriptId": script_id}))).await?;
        let source = response.get("scriptSource").and_then(|s| s.as_str()).unwrap_or_default();

        let mut data = TableData::new(vec!["line", "text"]);
        for (i, line) in source.lines().enumerate() {
            data.rows.push(vec![json!(i + 1), json!(line)]);
        }
        Ok(data)
    }
}

pub struct ListenersTable;

#[async_trait]
impl VirtualTable for ListenersTable {
    fn name(&self) -> &'static str {
        "listeners"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["object_id"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let object_id = required_str(filter, "object_id")?;
        let response = session
            .send("DOMDebugger.getEventListeners", Some(json!({"objectId": object_id})))
            .await?;
        let mut data = TableData::new(vec!["type", "use_capture", "passive", "once", "script_id", "line", "col"]);
        if let Some(listeners) = response.get("listeners").and_then(|l| l.as_array()) {
            for l in listeners {
                data.rows.push(vec![
                    l.get("type").cloned().unwrap_or(Value::Null),
                    l.get("useCapture").cloned().unwrap_or(Value::Null),
                    l.get("passive").cloned().unwrap_or(Value::Null),
                    l.get("once").cloned().unwrap_or(Value::Null),
                    l.get("scriptId").cloned().unwrap_or(Value::Null),
                    l.get("lineNumber").cloned().unwrap_or(Value::Null),
                    l.get("columnNumber").cloned().unwrap_or(Value::Null),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct DomTable;

#[async_trait]
impl VirtualTable for DomTable {
    fn name(&self) -> &'static str {
        "dom"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["selector"]
    }

    /// `DOM.getDocument` -> `querySelectorAll` -> per-node `describeNode` and
    /// a `callFunctionOn` for a short text preview.
    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let selector = required_str(filter, "selector")?;

        let doc = session.send("DOM.getDocument", Some(json!({"depth": 0}))).await?;
        let root_id = doc
            .get("root")
            .and_then(|r| r.get("nodeId"))
            .ok_or_else(|| Error::RequestFailed("DOM.getDocument returned no root nodeId".into()))?;

        let query = session
            .send("DOM.querySelectorAll", Some(json!({"nodeId": root_id, "selector": selector})))
            .await?;
        let node_ids: Vec<Value> = query.get("nodeIds").and_then(|n| n.as_array()).cloned().unwrap_or_default();

        let mut data = TableData::new(vec!["node_id", "node_name", "attributes", "text_preview"]);
        for node_id in node_ids {
            let described = session.send("DOM.describeNode", Some(json!({"nodeId": node_id}))).await?;
            let node = described.get("node").cloned().unwrap_or(Value::Null);
            let node_name = node.get("nodeName").cloned().unwrap_or(Value::Null);
            let attributes = node.get("attributes").cloned().unwrap_or(Value::Null);

            let preview = session
                .send(
                    "DOM.resolveNode",
                    Some(json!({"nodeId": node_id})),
                )
                .await
                .ok()
                .and_then(|r| r.get("object").and_then(|o| o.get("objectId")).cloned());
            let text_preview = if let Some(object_id) = preview {
                session
                    .send(
                        "Runtime.callFunctionOn",
                        Some(json!({
                            "objectId": object_id,
                            "functionDeclaration": "function() { return (this.innerText || this.textContent || '').slice(0, 80); }",
                            "returnByValue": true,
                        })),
                    )
                    .await
                    .ok()
                    .and_then(|r| r.get("result").and_then(|v| v.get("value")).cloned())
                    .unwrap_or(Value::Null)
            } else {
                Value::Null
            };

            data.rows.push(vec![node_id, node_name, attributes, text_preview]);
        }
        Ok(data)
    }
}

pub struct StylesTable;

#[async_trait]
impl VirtualTable for StylesTable {
    fn name(&self) -> &'static str {
        "styles"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["node_id"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let node_id = required_str(filter, "node_id")?;
        let node_id: i64 = node_id
            .parse()
            .map_err(|_| Error::InvalidRequest(format!("node_id must be an integer, got {node_id}")))?;

        let response = session.send("CSS.getComputedStyleForNode", Some(json!({"nodeId": node_id}))).await?;
        let mut data = TableData::new(vec!["name", "value"]);
        if let Some(props) = response.get("computedStyle").and_then(|p| p.as_array()) {
            for p in props {
                data.rows.push(vec![
                    p.get("name").cloned().unwrap_or(Value::Null),
                    p.get("value").cloned().unwrap_or(Value::Null),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct CookiesTable;

#[async_trait]
impl VirtualTable for CookiesTable {
    fn name(&self) -> &'static str {
        "cookies"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let response = session.send("Network.getAllCookies", None).await?;
        let mut data = TableData::new(vec!["name", "value", "domain", "path", "expires", "http_only", "secure"]);
        if let Some(cookies) = response.get("cookies").and_then(|c| c.as_array()) {
            for c in cookies {
                data.rows.push(vec![
                    c.get("name").cloned().unwrap_or(Value::Null),
                    c.get("value").cloned().unwrap_or(Value::Null),
                    c.get("domain").cloned().unwrap_or(Value::Null),
                    c.get("path").cloned().unwrap_or(Value::Null),
                    c.get("expires").cloned().unwrap_or(Value::Null),
                    c.get("httpOnly").cloned().unwrap_or(Value::Null),
                    c.get("secure").cloned().unwrap_or(Value::Null),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct PerformanceTable;

#[async_trait]
impl VirtualTable for PerformanceTable {
    fn name(&self) -> &'static str {
        "performance"
    }

    async fn fetch(&self, session: &Session, _filter: Option<&Expr>) -> Result<TableData> {
        let response = session.send("Performance.getMetrics", None).await?;
        let mut data = TableData::new(vec!["name", "value"]);
        if let Some(metrics) = response.get("metrics").and_then(|m| m.as_array()) {
            for m in metrics {
                data.rows.push(vec![
                    m.get("name").cloned().unwrap_or(Value::Null),
                    m.get("value").cloned().unwrap_or(Value::Null),
                ]);
            }
        }
        Ok(data)
    }
}

pub struct StorageTable;

#[async_trait]
impl VirtualTable for StorageTable {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["type"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let kind = required_str(filter, "type")?;
        if kind != "local" && kind != "session" {
            return Err(Error::InvalidRequest(format!("storage type must be local or session, got {kind}")));
        }
        let is_local_storage = kind == "local";
        let response = session
            .send(
                "DOMStorage.getDOMStorageItems",
                Some(json!({"storageId": {"securityOrigin": "", "isLocalStorage": is_local_storage}})),
            )
            .await?;
        let mut data = TableData::new(vec!["key", "value"]);
        if let Some(entries) = response.get("entries").and_then(|e| e.as_array()) {
            for entry in entries {
                if let Some(pair) = entry.as_array() {
                    data.rows.push(vec![
                        pair.first().cloned().unwrap_or(Value::Null),
                        pair.get(1).cloned().unwrap_or(Value::Null),
                    ]);
                }
            }
        }
        Ok(data)
    }
}

pub struct NetworkBodyTable;

#[async_trait]
impl VirtualTable for NetworkBodyTable {
    fn name(&self) -> &'static str {
        "network_body"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["request_id"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let request_id = required_str(filter, "request_id")?;
        let response = session
            .send("Network.getResponseBody", Some(json!({"requestId": request_id})))
            .await?;
        let mut data = TableData::new(vec!["request_id", "body", "base64_encoded"]);
        data.rows.push(vec![
            json!(request_id),
            response.get("body").cloned().unwrap_or(Value::Null),
            response.get("base64Encoded").cloned().unwrap_or(Value::Null),
        ]);
        Ok(data)
    }
}

pub struct NetworkHeadersTable;

#[async_trait]
impl VirtualTable for NetworkHeadersTable {
    fn name(&self) -> &'static str {
        "network_headers"
    }

    fn required_filters(&self) -> &'static [&'static str] {
        &["request_id"]
    }

    async fn fetch(&self, session: &Session, filter: Option<&Expr>) -> Result<TableData> {
        let request_id = required_str(filter, "request_id")?;
        let state = session.state().await;
        let state = state.read().await;
        let mut data = TableData::new(vec!["request_id", "name", "value"]);
        if let Some(req) = state.cdp.network_requests.get(request_id) {
            data.rows.push(vec![json!(req.request_id), json!("url"), json!(req.url)]);
            data.rows.push(vec![json!(req.request_id), json!("method"), json!(req.method)]);
            if let Some(status) = req.status {
                data.rows.push(vec![json!(req.request_id), json!("status"), json!(status)]);
            }
        }
        Ok(data)
    }
}

fn required_str<'a>(filter: Option<&'a Expr>, column: &str) -> Result<&'a str> {
    filter_value(filter, column)
        .and_then(|l| l.as_str())
        .ok_or_else(|| Error::MissingRequiredFilter(column.to_string()))
}
