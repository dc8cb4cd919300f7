//! Command dispatch table (spec §4.5/§6): one handler per CLI verb, all
//! operating against a shared `DaemonContext`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::attach::{list_devices, AttachEnvironment, AttachRequest, AttachStrategy, ProviderResolutionResult, ProviderResolver};
use crate::error::{Error, Result};
use crate::query::{engine, parser};
use crate::session::Session;

use super::args::{self, ParsedArgs};
use super::context::DaemonContext;
use super::protocol::{Request, Response};

pub async fn dispatch(ctx: &DaemonContext, req: Request) -> Response {
    let session_name = req.s.as_deref();
    let raw_args = req.args.as_deref().unwrap_or("");

    let result = match req.cmd.as_str() {
        "open" => handle_open(ctx, raw_args).await,
        "run" => handle_run(ctx, raw_args).await,
        "close" => handle_close(ctx, session_name).await,
        "restart" => handle_restart(ctx, session_name).await,
        "status" => handle_status(ctx, session_name).await,
        "ss" => handle_list(ctx).await,
        "use" => handle_use(ctx, raw_args).await,
        "attach" => handle_attach(ctx, raw_args).await,
        "attach-lldb" => handle_attach_lldb(ctx, raw_args).await,
        "devices" => handle_devices(ctx).await,

        "c" => send_verb(ctx, session_name, "Debugger.resume", None).await,
        "s" => send_verb(ctx, session_name, "Debugger.stepInto", None).await,
        "n" => send_verb(ctx, session_name, "Debugger.stepOver", None).await,
        "o" => send_verb(ctx, session_name, "Debugger.stepOut", None).await,
        "pause" => send_verb(ctx, session_name, "Debugger.pause", None).await,

        "b" => handle_set_breakpoint(ctx, session_name, raw_args).await,
        "db" => handle_remove_breakpoint(ctx, session_name, raw_args).await,
        "bl" => handle_query(ctx, session_name, "SELECT * FROM breakpoints").await,

        "e" => handle_evaluate(ctx, session_name, raw_args).await,
        "src" => handle_source(ctx, session_name, raw_args).await,

        "trace" => handle_trace(ctx, session_name, raw_args).await,
        "health" => handle_health(ctx, session_name).await,
        "reconnect" => Err(Error::InvalidState(
            "reconnect is not supported: close and reopen the session instead".into(),
        )),

        "q" => handle_query(ctx, session_name, raw_args).await,

        "navigate" => send_verb(ctx, session_name, "Page.navigate", Some(json!({"url": raw_args.trim()}))).await,
        "screenshot" => send_verb(ctx, session_name, "Page.captureScreenshot", None).await,
        "click" => handle_click(ctx, session_name, raw_args).await,
        "type" => send_verb(ctx, session_name, "Input.insertText", Some(json!({"text": raw_args}))).await,
        "select" => handle_select(ctx, session_name, raw_args).await,
        "mock" => handle_mock(ctx, session_name, raw_args).await,
        "unmock" => handle_unmock(ctx, session_name, raw_args).await,
        "emulate" => handle_emulate(ctx, session_name, raw_args).await,
        "throttle" => handle_throttle(ctx, session_name, raw_args).await,
        "coverage" => handle_coverage(ctx, session_name, raw_args).await,

        "registers" => send_verb(ctx, session_name, "Debugger.registers", None).await,
        "memory" => handle_memory(ctx, session_name, raw_args).await,
        "disasm" => handle_disasm(ctx, session_name, raw_args).await,

        other => Err(Error::InvalidRequest(format!("unknown command: {other}"))),
    };

    match result {
        Ok(body) => Response::ok(body),
        Err(e) => Response::err(e.to_string(), e.error_code()),
    }
}

async fn resolve(ctx: &DaemonContext, name: Option<&str>) -> Result<Arc<Session>> {
    ctx.registry.resolve(name).await
}

async fn send_verb(ctx: &DaemonContext, name: Option<&str>, method: &str, params: Option<Value>) -> Result<Value> {
    let session = resolve(ctx, name).await?;
    session.send(method, params).await
}

fn split_host_port(raw: &str) -> Result<(String, u16)> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::InvalidRequest(format!("invalid port: {port}")))?;
            Ok((host.to_string(), port))
        }
        None => {
            let port: u16 = raw
                .parse()
                .map_err(|_| Error::InvalidRequest(format!("invalid port: {raw}")))?;
            Ok(("127.0.0.1".to_string(), port))
        }
    }
}

async fn handle_open(ctx: &DaemonContext, raw_args: &str) -> Result<Value> {
    let args = args::parse(raw_args)?;
    let target = args
        .positional(0)
        .ok_or_else(|| Error::InvalidRequest("open requires [host:]port".into()))?;
    let (host, port) = split_host_port(target)?;
    let kind = args.flag("type").map(crate::transport::cdp::TargetKind::parse).transpose()?;
    let target_id = args.flag("target");
    let session = ctx.registry.open(&host, port, kind, target_id).await?;
    Ok(json!({"session": session.name}))
}

async fn handle_run(ctx: &DaemonContext, raw_args: &str) -> Result<Value> {
    if raw_args.trim().is_empty() {
        return Err(Error::InvalidRequest("run requires a command".into()));
    }
    let session = ctx.registry.run(raw_args, true).await?;
    Ok(json!({"session": session.name}))
}

async fn handle_close(ctx: &DaemonContext, name: Option<&str>) -> Result<Value> {
    ctx.registry.close(name).await?;
    Ok(json!({}))
}

async fn handle_restart(ctx: &DaemonContext, name: Option<&str>) -> Result<Value> {
    let restored = ctx.registry.restart(name).await?;
    Ok(json!({"restoredBreakpoints": restored}))
}

async fn handle_status(ctx: &DaemonContext, name: Option<&str>) -> Result<Value> {
    let session = resolve(ctx, name).await?;
    let state = session.state().await;
    let state = state.read().await;
    Ok(json!({
        "session": session.name,
        "connected": state.connected,
        "paused": state.paused,
        "pid": state.pid,
        "frames": state.call_frames.len(),
    }))
}

async fn handle_list(ctx: &DaemonContext) -> Result<Value> {
    Ok(json!({
        "sessions": ctx.registry.list().await,
        "current": ctx.registry.current().await,
    }))
}

async fn handle_use(ctx: &DaemonContext, raw_args: &str) -> Result<Value> {
    let name = raw_args.trim();
    if name.is_empty() {
        return Err(Error::InvalidRequest("use requires a session name".into()));
    }
    ctx.registry.set_current(name).await?;
    Ok(json!({"current": name}))
}

fn parse_attach_args(parsed: &ParsedArgs) -> Result<AttachRequest> {
    let platform = parsed.flag("platform").unwrap_or("ios").to_string();
    let bundle_id = parsed
        .flag("bundle-id")
        .ok_or_else(|| Error::InvalidRequest("attach requires --bundle-id".into()))?
        .to_string();
    let device_id = parsed.flag("device-id").map(String::from);
    let pid = parsed.flag("pid").and_then(|p| p.parse::<i64>().ok());
    let launch = parsed.flag("launch").map(|v| v == "true").unwrap_or(false);
    let verbose = parsed.flag("verbose").map(|v| v == "true").unwrap_or(false);
    let timeout_ms = parsed.flag("timeout-ms").and_then(|t| t.parse::<u64>().ok());
    let attach_strategy = match parsed.flag("strategy") {
        None | Some("auto") => AttachStrategy::Auto,
        Some("device-process") => AttachStrategy::DeviceProcess,
        Some("gdb-remote") => AttachStrategy::GdbRemote,
        Some(other) => return Err(Error::InvalidRequest(format!("unknown attach strategy: {other}"))),
    };
    Ok(AttachRequest {
        provider: "host-tooling".to_string(),
        platform,
        bundle_id,
        device_id,
        pid,
        launch,
        attach_strategy,
        timeout_ms,
        verbose,
    })
}

async fn handle_attach(ctx: &DaemonContext, raw_args: &str) -> Result<Value> {
    let parsed = args::parse(raw_args)?;
    let request = parse_attach_args(&parsed)?;
    let attach_manager = ctx.attach_manager();
    let (session, diagnostics) = ctx.registry.attach(request, &ctx.resolver, &attach_manager).await?;
    Ok(json!({"session": session.name, "diagnostics": diagnostics}))
}

/// Direct pid attach, bypassing device/bundle resolution (the `attach-lldb`
/// CLI verb) — synthesizes a resolution instead of calling out to
/// `HostToolingResolver`.
struct DirectResolver(ProviderResolutionResult);

#[async_trait]
impl ProviderResolver for DirectResolver {
    async fn resolve(&self, _request: &AttachRequest) -> Result<ProviderResolutionResult> {
        Ok(self.0.clone())
    }
}

async fn handle_attach_lldb(ctx: &DaemonContext, raw_args: &str) -> Result<Value> {
    let parsed = args::parse(raw_args)?;
    let pid: i64 = parsed
        .positional(0)
        .or_else(|| parsed.flag("pid"))
        .ok_or_else(|| Error::InvalidRequest("attach-lldb requires a pid".into()))?
        .parse()
        .map_err(|_| Error::InvalidPid(raw_args.to_string()))?;

    let request = AttachRequest {
        provider: "direct".to_string(),
        platform: "native".to_string(),
        bundle_id: String::new(),
        device_id: None,
        pid: Some(pid),
        launch: false,
        attach_strategy: AttachStrategy::DeviceProcess,
        timeout_ms: parsed.flag("timeout-ms").and_then(|t| t.parse().ok()),
        verbose: false,
    };
    let resolution = ProviderResolutionResult {
        provider: "direct".to_string(),
        platform: "native".to_string(),
        device_id: String::new(),
        bundle_id: String::new(),
        pid: Some(pid),
        attach_protocol: "lldb".to_string(),
        attach_environment: AttachEnvironment::Device,
        metadata: Value::Null,
    };
    let resolver = DirectResolver(resolution);
    let attach_manager = ctx.attach_manager();
    let (session, diagnostics) = ctx.registry.attach(request, &resolver, &attach_manager).await?;
    Ok(json!({"session": session.name, "diagnostics": diagnostics}))
}

async fn handle_devices(ctx: &DaemonContext) -> Result<Value> {
    list_devices(&ctx.config.host_tooling_path).await
}

fn parse_breakpoint_spec(raw: &str) -> Result<(String, i64, Option<String>)> {
    let (location, condition) = match raw.split_once(" if ") {
        Some((loc, cond)) => (loc.trim(), Some(cond.trim().to_string())),
        None => (raw.trim(), None),
    };
    let (file, line) = location
        .rsplit_once(':')
        .ok_or_else(|| Error::InvalidRequest(format!("breakpoint spec must be file:line, got {raw}")))?;
    let line: i64 = line
        .parse()
        .map_err(|_| Error::InvalidRequest(format!("invalid line number: {line}")))?;
    Ok((file.to_string(), line, condition))
}

async fn handle_set_breakpoint(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let (file, line, condition) = parse_breakpoint_spec(raw_args)?;
    let session = resolve(ctx, name).await?;
    session
        .send(
            "Debugger.setBreakpointByUrl",
            Some(json!({"url": file, "lineNumber": line, "condition": condition})),
        )
        .await
}

async fn handle_remove_breakpoint(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let id = raw_args.trim();
    if id.is_empty() {
        return Err(Error::InvalidRequest("db requires a breakpoint id".into()));
    }
    let session = resolve(ctx, name).await?;
    let bp = {
        let state = session.state().await;
        let state = state.read().await;
        state.breakpoints.get(id).cloned()
    };
    let bp = bp.ok_or_else(|| Error::InvalidRequest(format!("unknown breakpoint id: {id}")))?;
    session
        .send(
            "Debugger.removeBreakpoint",
            Some(json!({
                "breakpointId": bp.native_id.clone().unwrap_or_else(|| id.to_string()),
                "url": bp.file,
                "lineNumber": bp.line,
            })),
        )
        .await
}

async fn handle_evaluate(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let expr = raw_args.trim();
    if expr.is_empty() {
        return Err(Error::InvalidRequest("e requires an expression".into()));
    }
    let session = resolve(ctx, name).await?;
    let (paused, frame_id) = {
        let state = session.state().await;
        let state = state.read().await;
        (state.paused, state.call_frames.first().map(|f| f.frame_id.clone()))
    };
    match (paused, frame_id) {
        (true, Some(frame_id)) => {
            session
                .send(
                    "Debugger.evaluateOnCallFrame",
                    Some(json!({"expression": expr, "callFrameId": frame_id})),
                )
                .await
        }
        _ => session.send("Runtime.evaluate", Some(json!({"expression": expr}))).await,
    }
}

async fn handle_source(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let mut parts = raw_args.split_whitespace();
    let file = parts.next();
    let start: Option<usize> = parts.next().and_then(|s| s.parse().ok());
    let end: Option<usize> = parts.next().and_then(|s| s.parse().ok());

    let session = resolve(ctx, name).await?;
    let file = match file {
        Some(f) => f.to_string(),
        None => {
            let state = session.state().await;
            let state = state.read().await;
            state
                .call_frames
                .first()
                .and_then(|f| f.file.clone())
                .ok_or_else(|| Error::InvalidRequest("src requires a file when no frame is active".into()))?
        }
    };

    let sql = format!("SELECT * FROM source WHERE file = '{file}'");
    let query = parser::parse(&sql)?;
    let result = engine::execute(&query, &session, &ctx.tables).await?;

    let rows: Vec<&Vec<Value>> = result
        .rows
        .iter()
        .filter(|row| {
            let line = row.first().and_then(|v| v.as_i64()).unwrap_or(0) as usize;
            start.map(|s| line >= s).unwrap_or(true) && end.map(|e| line <= e).unwrap_or(true)
        })
        .collect();

    Ok(json!({
        "columns": result.columns,
        "rows": rows,
    }))
}

async fn handle_trace(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let limit: u64 = raw_args.trim().parse().unwrap_or(200);
    handle_query(ctx, name, &format!("SELECT * FROM timeline ORDER BY id DESC LIMIT {limit}")).await
}

async fn handle_health(ctx: &DaemonContext, name: Option<&str>) -> Result<Value> {
    let session = resolve(ctx, name).await?;
    Ok(json!({"connected": session.is_connected().await}))
}

async fn handle_query(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let session = resolve(ctx, name).await?;
    let rendered = crate::query::run(raw_args, &session, &ctx.tables).await?;
    Ok(json!({"result": rendered}))
}

/// Resolves a CSS `selector` to the `objectId` of its first DOM match, the
/// shared step behind `click`/`select` (grounded on the `dom` table's
/// `querySelectorAll` -> `resolveNode` sequence).
async fn resolve_selector_object_id(session: &Session, selector: &str) -> Result<String> {
    let doc = session.send("DOM.getDocument", Some(json!({"depth": 0}))).await?;
    let root_id = doc
        .get("root")
        .and_then(|r| r.get("nodeId"))
        .ok_or_else(|| Error::RequestFailed("DOM.getDocument returned no root nodeId".into()))?;
    let query = session
        .send("DOM.querySelector", Some(json!({"nodeId": root_id, "selector": selector})))
        .await?;
    let node_id = query
        .get("nodeId")
        .ok_or_else(|| Error::InvalidRequest(format!("no element matches selector: {selector}")))?;
    let resolved = session.send("DOM.resolveNode", Some(json!({"nodeId": node_id}))).await?;
    resolved
        .get("object")
        .and_then(|o| o.get("objectId"))
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| Error::RequestFailed("DOM.resolveNode returned no objectId".into()))
}

async fn handle_click(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let selector = raw_args.trim();
    if selector.is_empty() {
        return Err(Error::InvalidRequest("click requires a selector".into()));
    }
    let session = resolve(ctx, name).await?;
    let object_id = resolve_selector_object_id(&session, selector).await?;
    let quads = session
        .send("DOM.getContentQuads", Some(json!({"objectId": object_id})))
        .await?;
    let quad = quads
        .get("quads")
        .and_then(|q| q.as_array())
        .and_then(|q| q.first())
        .and_then(|q| q.as_array())
        .ok_or_else(|| Error::RequestFailed(format!("no content quad for selector: {selector}")))?;
    let (x, y) = center_of_quad(quad);

    session
        .send(
            "Input.dispatchMouseEvent",
            Some(json!({"type": "mousePressed", "x": x, "y": y, "button": "left", "clickCount": 1})),
        )
        .await?;
    session
        .send(
            "Input.dispatchMouseEvent",
            Some(json!({"type": "mouseReleased", "x": x, "y": y, "button": "left", "clickCount": 1})),
        )
        .await
}

fn center_of_quad(quad: &[Value]) -> (f64, f64) {
    let xs: Vec<f64> = quad.iter().step_by(2).filter_map(|v| v.as_f64()).collect();
    let ys: Vec<f64> = quad.iter().skip(1).step_by(2).filter_map(|v| v.as_f64()).collect();
    let avg = |v: &[f64]| if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 };
    (avg(&xs), avg(&ys))
}

async fn handle_select(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let mut parts = raw_args.splitn(2, ' ');
    let selector = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidRequest("select requires a selector and a value".into()))?;
    let value = parts
        .next()
        .ok_or_else(|| Error::InvalidRequest("select requires a selector and a value".into()))?;

    let session = resolve(ctx, name).await?;
    let object_id = resolve_selector_object_id(&session, selector).await?;
    session
        .send(
            "Runtime.callFunctionOn",
            Some(json!({
                "objectId": object_id,
                "functionDeclaration": format!(
                    "function() {{ this.value = {}; this.dispatchEvent(new Event('change', {{bubbles: true}})); }}",
                    serde_json::to_string(value).unwrap_or_default()
                ),
                "returnByValue": true,
            })),
        )
        .await
}

async fn handle_mock(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let mut parts = raw_args.splitn(3, ' ');
    let url_pattern = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidRequest("mock requires url_pattern status [body]".into()))?
        .to_string();
    let status: u16 = parts
        .next()
        .ok_or_else(|| Error::InvalidRequest("mock requires a status code".into()))?
        .parse()
        .map_err(|_| Error::InvalidRequest("mock status must be a number".into()))?;
    let body = parts.next().unwrap_or("").to_string();

    let session = resolve(ctx, name).await?;
    let state = session.state().await;
    let mut state = state.write().await;
    state.cdp.mock_rules.retain(|r| r.url_pattern != url_pattern);
    state.cdp.mock_rules.push(crate::state::MockRule { url_pattern: url_pattern.clone(), status, body });
    Ok(json!({"mocked": url_pattern}))
}

async fn handle_unmock(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let url_pattern = raw_args.trim();
    if url_pattern.is_empty() {
        return Err(Error::InvalidRequest("unmock requires a url_pattern".into()));
    }
    let session = resolve(ctx, name).await?;
    let state = session.state().await;
    let mut state = state.write().await;
    let before = state.cdp.mock_rules.len();
    state.cdp.mock_rules.retain(|r| r.url_pattern != url_pattern);
    Ok(json!({"removed": before - state.cdp.mock_rules.len()}))
}

async fn handle_emulate(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let parsed = args::parse(raw_args)?;
    let width: i64 = parsed
        .positional(0)
        .ok_or_else(|| Error::InvalidRequest("emulate requires width height".into()))?
        .parse()
        .map_err(|_| Error::InvalidRequest("emulate width must be a number".into()))?;
    let height: i64 = parsed
        .positional(1)
        .ok_or_else(|| Error::InvalidRequest("emulate requires width height".into()))?
        .parse()
        .map_err(|_| Error::InvalidRequest("emulate height must be a number".into()))?;
    let scale: f64 = parsed.flag("scale").and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let mobile = parsed.flag("mobile").map(|v| v == "true").unwrap_or(false);

    send_verb(
        ctx,
        name,
        "Emulation.setDeviceMetricsOverride",
        Some(json!({"width": width, "height": height, "deviceScaleFactor": scale, "mobile": mobile})),
    )
    .await
}

async fn handle_throttle(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let profile = raw_args.trim();
    let conditions = match profile {
        "offline" => json!({"offline": true, "latency": 0, "downloadThroughput": 0, "uploadThroughput": 0}),
        "slow3g" => json!({"offline": false, "latency": 400, "downloadThroughput": 50_000, "uploadThroughput": 50_000}),
        "fast3g" => json!({"offline": false, "latency": 150, "downloadThroughput": 180_000, "uploadThroughput": 84_000}),
        "none" | "" => json!({"offline": false, "latency": 0, "downloadThroughput": -1, "uploadThroughput": -1}),
        other => return Err(Error::InvalidRequest(format!("unknown throttle profile: {other}"))),
    };
    send_verb(ctx, name, "Network.emulateNetworkConditions", Some(conditions)).await
}

async fn handle_coverage(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    match raw_args.trim() {
        "start" => {
            send_verb(ctx, name, "Profiler.startPreciseCoverage", Some(json!({"detailed": true}))).await?;
            send_verb(ctx, name, "CSS.startRuleUsageTracking", None).await
        }
        "stop" => {
            let session = resolve(ctx, name).await?;
            let js = session.send("Profiler.takePreciseCoverage", None).await?;
            let css = session.send("CSS.stopRuleUsageTracking", None).await?;
            let _ = session.send("Profiler.stopPreciseCoverage", None).await;
            let snapshot = crate::state::CoverageSnapshot { js, css, captured_at: 0 };
            let state = session.state().await;
            state.write().await.cdp.coverage = Some(snapshot.clone());
            Ok(json!({"js": snapshot.js, "css": snapshot.css}))
        }
        other => Err(Error::InvalidRequest(format!("coverage expects start or stop, got {other}"))),
    }
}

async fn handle_memory(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let mut parts = raw_args.split_whitespace();
    let address = parts
        .next()
        .ok_or_else(|| Error::InvalidRequest("memory requires address [length]".into()))?;
    let length: i64 = parts.next().and_then(|l| l.parse().ok()).unwrap_or(64);
    send_verb(
        ctx,
        name,
        "Debugger.readMemory",
        Some(json!({"memoryReference": address, "count": length})),
    )
    .await
}

async fn handle_disasm(ctx: &DaemonContext, name: Option<&str>, raw_args: &str) -> Result<Value> {
    let mut parts = raw_args.split_whitespace();
    let address = parts
        .next()
        .ok_or_else(|| Error::InvalidRequest("disasm requires address [count]".into()))?;
    let count: i64 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(16);
    send_verb(
        ctx,
        name,
        "Debugger.disassemble",
        Some(json!({"memoryReference": address, "instructionCount": count})),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_breakpoint_spec_splits_file_line_and_condition() {
        let (file, line, cond) = parse_breakpoint_spec("app.js:42 if x > 1").unwrap();
        assert_eq!(file, "app.js");
        assert_eq!(line, 42);
        assert_eq!(cond.as_deref(), Some("x > 1"));
    }

    #[test]
    fn parse_breakpoint_spec_without_condition() {
        let (file, line, cond) = parse_breakpoint_spec("app.js:10").unwrap();
        assert_eq!(file, "app.js");
        assert_eq!(line, 10);
        assert!(cond.is_none());
    }

    #[test]
    fn split_host_port_defaults_to_loopback() {
        let (host, port) = split_host_port("9229").unwrap();
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 9229);
    }

    #[test]
    fn split_host_port_honors_explicit_host() {
        let (host, port) = split_host_port("192.168.1.5:9229").unwrap();
        assert_eq!(host, "192.168.1.5");
        assert_eq!(port, 9229);
    }

    #[test]
    fn center_of_quad_averages_corners() {
        let quad = vec![json!(0.0), json!(0.0), json!(10.0), json!(0.0), json!(10.0), json!(10.0), json!(0.0), json!(10.0)];
        let (x, y) = center_of_quad(&quad);
        assert_eq!(x, 5.0);
        assert_eq!(y, 5.0);
    }
}
