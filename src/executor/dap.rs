//! DAP executor: translates CDP-shaped verbs onto a spawned adapter process,
//! runs the session phase state machine, and implements pause-waiter
//! fencing on `stopEpoch` (spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex, RwLock};

use crate::error::{Error, Result};
use crate::state::{CallFrame, DapPhase, DebuggerState, LastError, StopDescriptor};
use crate::transport::dap::{CloseInfo, CloseReason, DapClient};
use crate::transport::dap::types::{
    Breakpoint, EvaluateArguments, Scope, ScopesArguments, SetBreakpointsArguments, Source,
    SourceBreakpoint, StackFrame, StackTraceArguments, Thread, Variable,
};

struct PauseWaiter {
    min_epoch: u64,
    tx: Option<oneshot::Sender<Result<()>>>,
}

pub struct DapExecutor {
    client: Arc<DapClient>,
    state: Arc<RwLock<DebuggerState>>,
    waiters: Arc<Mutex<Vec<PauseWaiter>>>,
    /// per-source-path breakpoint list, keyed by path (spec §4.3 "Breakpoint grouping")
    breakpoints_by_source: Arc<Mutex<HashMap<String, Vec<SourceBreakpoint>>>>,
}

impl DapExecutor {
    /// Spawn the adapter, run the `initialize`/`launch` handshake, and start
    /// the background loops that keep phase/state current.
    pub async fn spawn(program: &str, args: &[String], launch_args: Value) -> Result<Self> {
        Self::start(program, args, "launch", launch_args, Duration::from_secs(30)).await
    }

    /// Like [`spawn`](Self::spawn), but completes the handshake with an
    /// `attach` request instead of `launch` — used by the Apple-device
    /// attach pipeline's `device-process`/`gdb-remote` strategies.
    pub async fn attach(program: &str, args: &[String], attach_args: Value, timeout: Duration) -> Result<Self> {
        Self::start(program, args, "attach", attach_args, timeout).await
    }

    async fn start(
        program: &str,
        args: &[String],
        second_command: &str,
        second_args: Value,
        second_timeout: Duration,
    ) -> Result<Self> {
        let client = Arc::new(DapClient::spawn(program, args).await?);
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        {
            let mut s = state.write().await;
            s.connected = true;
            s.managed_command = Some(program.to_string());
            s.dap.phase = DapPhase::Starting;
        }

        let executor = Self {
            client: client.clone(),
            state: state.clone(),
            waiters: Arc::new(Mutex::new(Vec::new())),
            breakpoints_by_source: Arc::new(Mutex::new(HashMap::new())),
        };
        executor.spawn_event_pumps().await;
        executor.spawn_close_pump().await;

        executor
            .handshake(second_command, second_args, second_timeout)
            .await?;
        Ok(executor)
    }

    async fn handshake(&self, second_command: &str, second_args: Value, second_timeout: Duration) -> Result<()> {
        let init_args = json!({
            "clientID": "dbgd",
            "clientName": "dbgd",
            "adapterID": "dbgd",
            "linesStartAt1": true,
            "columnsStartAt1": true,
            "pathFormat": "path",
        });
        self.client
            .send_request("initialize", Some(init_args), Some(Duration::from_secs(10)))
            .await?;

        self.state.write().await.dap.phase = DapPhase::Configuring;

        self.client
            .send_request(second_command, Some(second_args), Some(second_timeout))
            .await?;
        self.client
            .send_request("configurationDone", None, Some(Duration::from_secs(10)))
            .await?;

        self.state.write().await.dap.phase = DapPhase::Running;
        Ok(())
    }

    pub fn state(&self) -> Arc<RwLock<DebuggerState>> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.client.is_failed()
    }

    pub async fn disconnect(&self) {
        self.client
            .fail_transport(CloseReason::ManualClose, None, None, None)
            .await;
        self.state.write().await.on_disconnected();
    }

    /// Fail fast in `terminated`/`error` with the last recorded error
    /// (spec §4.3 "Session phase state machine").
    async fn guard_phase(&self) -> Result<()> {
        let s = self.state.read().await;
        match s.dap.phase {
            DapPhase::Terminated | DapPhase::Error => {
                if let Some(err) = &s.dap.last_error {
                    Err(Error::SessionTerminated(err.message.clone()))
                } else {
                    Err(Error::SessionTerminated("session terminated".into()))
                }
            }
            _ => Ok(()),
        }
    }

    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.guard_phase().await?;
        match method {
            "Debugger.resume" => self.current_thread_request("continue").await,
            "Debugger.stepInto" => self.current_thread_request("stepIn").await,
            "Debugger.stepOver" => self.current_thread_request("next").await,
            "Debugger.stepOut" => self.current_thread_request("stepOut").await,
            "Debugger.pause" => self.current_thread_request("pause").await,
            "Runtime.evaluate" => {
                let expression = params
                    .as_ref()
                    .and_then(|p| p.get("expression"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let args = EvaluateArguments {
                    expression,
                    frame_id: None,
                    context: "watch".to_string(),
                };
                self.client
                    .send_request("evaluate", Some(serde_json::to_value(args)?), None)
                    .await
            }
            "Debugger.evaluateOnCallFrame" => {
                let expression = params
                    .as_ref()
                    .and_then(|p| p.get("expression"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let frame_id = params.as_ref().and_then(|p| p.get("callFrameId")).and_then(|v| v.as_i64());
                let args = EvaluateArguments {
                    expression,
                    frame_id,
                    context: "repl".to_string(),
                };
                self.client
                    .send_request("evaluate", Some(serde_json::to_value(args)?), None)
                    .await
            }
            "Runtime.getProperties" => {
                let variables_reference = params
                    .as_ref()
                    .and_then(|p| p.get("objectId"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0);
                self.client
                    .send_request("variables", Some(json!({"variablesReference": variables_reference})), None)
                    .await
            }
            "Debugger.getScriptSource" => {
                let script_id = params
                    .as_ref()
                    .and_then(|p| p.get("scriptId"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let path = {
                    let s = self.state.read().await;
                    s.scripts.get(&script_id).and_then(|si| si.file.clone())
                };
                self.client
                    .send_request(
                        "source",
                        Some(json!({"source": {"path": path}})),
                        None,
                    )
                    .await
            }
            "Debugger.setBreakpointByUrl" => self.set_breakpoint_by_url(params).await,
            "Debugger.removeBreakpoint" => self.remove_breakpoint(params).await,
            "Debugger.registers" => self.registers().await,
            "Debugger.readMemory" => self.client.send_request("readMemory", params, None).await,
            "Debugger.disassemble" => self.client.send_request("disassemble", params, None).await,
            other => Err(Error::ProtocolMessageInvalid(format!(
                "unsupported verb for DAP executor: {other}"
            ))),
        }
    }

    /// lldb-dap exposes CPU registers as a "Registers" scope on the top
    /// frame rather than a dedicated request; fetch its variables.
    async fn registers(&self) -> Result<Value> {
        let frame = {
            let s = self.state.read().await;
            s.call_frames.first().cloned()
        };
        let Some(frame) = frame else {
            return Err(Error::NoActiveThread);
        };
        let variables_reference = frame
            .scope_chain
            .iter()
            .find(|sc| sc.get("name").and_then(|n| n.as_str()) == Some("Registers"))
            .and_then(|sc| sc.get("variablesReference"))
            .and_then(|v| v.as_i64());
        let Some(variables_reference) = variables_reference else {
            return Ok(json!({"variables": []}));
        };
        self.client
            .send_request("variables", Some(json!({"variablesReference": variables_reference})), None)
            .await
    }

    async fn current_thread_request(&self, command: &str) -> Result<Value> {
        let thread_id = {
            let s = self.state.read().await;
            s.dap.active_thread_id.ok_or(Error::NoActiveThread)?
        };
        self.client
            .send_request(command, Some(json!({"threadId": thread_id})), None)
            .await
    }

    async fn set_breakpoint_by_url(&self, params: Option<Value>) -> Result<Value> {
        let params = params.unwrap_or(Value::Null);
        let path = params["url"].as_str().unwrap_or_default().to_string();
        let line = params["lineNumber"].as_i64().unwrap_or(0);
        let condition = params["condition"].as_str().map(str::to_string);

        let mut by_source = self.breakpoints_by_source.lock().await;
        let list = by_source.entry(path.clone()).or_default();
        list.push(SourceBreakpoint {
            line,
            column: None,
            condition,
            hit_condition: None,
        });
        let breakpoints = list.clone();
        drop(by_source);

        self.rebuild_breakpoints(&path, breakpoints).await
    }

    async fn remove_breakpoint(&self, params: Option<Value>) -> Result<Value> {
        let params = params.unwrap_or(Value::Null);
        let path = params["url"].as_str().unwrap_or_default().to_string();
        let line = params["lineNumber"].as_i64();

        let mut by_source = self.breakpoints_by_source.lock().await;
        let list = by_source.entry(path.clone()).or_default();
        if let Some(line) = line {
            list.retain(|bp| bp.line != line);
        }
        let survivors = list.clone();
        drop(by_source);

        self.rebuild_breakpoints(&path, survivors).await
    }

    /// Rewrite the full per-source breakpoint list via a single
    /// `setBreakpoints` call (spec §4.3 "Breakpoint grouping").
    async fn rebuild_breakpoints(&self, path: &str, breakpoints: Vec<SourceBreakpoint>) -> Result<Value> {
        let args = SetBreakpointsArguments {
            source: Source {
                name: None,
                path: Some(path.to_string()),
                source_reference: None,
            },
            breakpoints,
        };
        let result = self
            .client
            .send_request("setBreakpoints", Some(serde_json::to_value(args)?), None)
            .await?;

        let resolved: Vec<Breakpoint> = serde_json::from_value(result["breakpoints"].clone()).unwrap_or_default();
        let mut locations = Vec::new();
        for bp in &resolved {
            if let Some(line) = bp.line {
                locations.push(json!({
                    "breakpointId": format!("{path}:{line}"),
                    "lineNumber": line,
                }));
            }
        }
        Ok(json!({ "locations": locations }))
    }

    /// Resolve once `paused ∧ stopEpoch ≥ minEpoch`; else register a waiter
    /// racing `timeout` (spec §4.3 "Pause-waiter discipline").
    pub async fn wait_for_paused(&self, timeout: Duration, min_epoch: u64) -> Result<()> {
        {
            let s = self.state.read().await;
            if s.paused && s.dap.stop_epoch >= min_epoch {
                return Ok(());
            }
            if matches!(s.dap.phase, DapPhase::Terminated | DapPhase::Error) {
                return Err(Error::SessionTerminated(
                    s.dap
                        .last_error
                        .as_ref()
                        .map(|e| e.message.clone())
                        .unwrap_or_else(|| "session terminated".into()),
                ));
            }
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.push(PauseWaiter {
            min_epoch,
            tx: Some(tx),
        });

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::WaitForPauseTimeout),
            Err(_) => Err(Error::WaitForPauseTimeout),
        }
    }

    async fn spawn_close_pump(&self) {
        let mut rx = self.client.on_close().await;
        let state = self.state.clone();
        let waiters = self.waiters.clone();
        tokio::spawn(async move {
            if let Some(info) = rx.recv().await {
                handle_close(&state, &waiters, info).await;
            }
        });
    }

    async fn spawn_event_pumps(&self) {
        let mut stopped_rx = self.client.on_event("stopped").await;
        {
            let state = self.state.clone();
            let waiters = self.waiters.clone();
            let client = self.client.clone();
            tokio::spawn(async move {
                while let Some(event) = stopped_rx.recv().await {
                    handle_stopped(&state, &waiters, &client, event.body.unwrap_or(Value::Null)).await;
                }
            });
        }

        let mut continued_rx = self.client.on_event("continued").await;
        {
            let state = self.state.clone();
            tokio::spawn(async move {
                while let Some(_event) = continued_rx.recv().await {
                    let mut s = state.write().await;
                    s.paused = false;
                    s.dap.phase = DapPhase::Running;
                    s.call_frames.clear();
                }
            });
        }

        let mut terminated_rx = self.client.on_event("terminated").await;
        {
            let state = self.state.clone();
            let waiters = self.waiters.clone();
            tokio::spawn(async move {
                if terminated_rx.recv().await.is_some() {
                    let mut s = state.write().await;
                    s.dap.phase = DapPhase::Terminated;
                    s.connected = false;
                    s.paused = false;
                    drop(s);
                    reject_all_waiters(&waiters, Error::SessionTerminated("adapter reported termination".into())).await;
                }
            });
        }

        let mut thread_rx = self.client.on_event("thread").await;
        {
            let state = self.state.clone();
            tokio::spawn(async move {
                while let Some(event) = thread_rx.recv().await {
                    let body = event.body.unwrap_or(Value::Null);
                    let id = body["threadId"].as_i64().unwrap_or(0);
                    let reason = body["reason"].as_str().unwrap_or("");
                    let mut s = state.write().await;
                    match reason {
                        "started" => {
                            if !s.dap.threads.contains(&id) {
                                s.dap.threads.push(id);
                            }
                        }
                        "exited" => s.dap.threads.retain(|t| *t != id),
                        _ => {}
                    }
                }
            });
        }
    }
}

async fn handle_close(state: &Arc<RwLock<DebuggerState>>, waiters: &Arc<Mutex<Vec<PauseWaiter>>>, info: CloseInfo) {
    let mut s = state.write().await;
    s.dap.phase = DapPhase::Terminated;
    s.dap.last_error = Some(LastError {
        code: "TRANSPORT_CLOSED".to_string(),
        message: info.error.unwrap_or_else(|| format!("{:?}", info.reason)),
        ts: 0,
    });
    s.on_disconnected();
    drop(s);
    reject_all_waiters(waiters, Error::SessionTerminated("transport closed".into())).await;
}

/// The DAP `stopped` processing chain (spec §4.3 "Stop event processing").
async fn handle_stopped(
    state: &Arc<RwLock<DebuggerState>>,
    waiters: &Arc<Mutex<Vec<PauseWaiter>>>,
    client: &Arc<DapClient>,
    body: Value,
) {
    let reason = body["reason"].as_str().unwrap_or("unknown").to_string();
    let event_thread_id = body["threadId"].as_i64();

    let result: Result<()> = async {
        let threads_resp = client.send_request("threads", None, Some(Duration::from_secs(10))).await?;
        let threads: Vec<Thread> = serde_json::from_value(threads_resp["threads"].clone())
            .map_err(|e| Error::ProtocolJsonInvalid(e.to_string()))?;
        let thread_ids: Vec<i64> = threads.iter().map(|t| t.id).collect();

        let prior_thread_id = state.read().await.dap.active_thread_id;
        let active_thread = event_thread_id
            .filter(|id| thread_ids.contains(id))
            .or_else(|| prior_thread_id.filter(|id| thread_ids.contains(id)))
            .or_else(|| thread_ids.first().copied())
            .ok_or(Error::NoActiveThread)?;

        let stack_resp = client
            .send_request(
                "stackTrace",
                Some(serde_json::to_value(StackTraceArguments { thread_id: active_thread })?),
                Some(Duration::from_secs(10)),
            )
            .await?;
        let frames: Vec<StackFrame> = serde_json::from_value(stack_resp["stackFrames"].clone())
            .map_err(|e| Error::ProtocolJsonInvalid(e.to_string()))?;

        let mut call_frames = Vec::with_capacity(frames.len());
        for frame in &frames {
            let scopes_resp = client
                .send_request(
                    "scopes",
                    Some(serde_json::to_value(ScopesArguments { frame_id: frame.id })?),
                    Some(Duration::from_secs(10)),
                )
                .await?;
            let scopes: Vec<Scope> = serde_json::from_value(scopes_resp["scopes"].clone()).unwrap_or_default();
            call_frames.push(CallFrame {
                frame_id: frame.id.to_string(),
                function: frame.name.clone(),
                url: frame.source.as_ref().and_then(|s| s.path.clone()),
                file: frame.source.as_ref().and_then(|s| s.path.clone()),
                line: frame.line,
                col: frame.column,
                script_id: None,
                scope_chain: scopes
                    .into_iter()
                    .map(|sc| json!({"name": sc.name, "variablesReference": sc.variables_reference, "expensive": sc.expensive}))
                    .collect(),
                this_object_id: None,
            });
        }

        let mut s = state.write().await;
        s.paused = true;
        s.dap.phase = DapPhase::Paused;
        s.dap.threads = thread_ids;
        s.dap.active_thread_id = Some(active_thread);
        s.dap.last_stop = Some(StopDescriptor {
            reason,
            thread_id: active_thread,
            ts: body["ts"].as_i64().unwrap_or(0),
        });
        s.call_frames = call_frames;
        s.dap.stop_epoch += 1;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => {
            let epoch = state.read().await.dap.stop_epoch;
            resolve_ready_waiters(waiters, epoch).await;
        }
        Err(e) => {
            let mut s = state.write().await;
            s.dap.phase = DapPhase::Error;
            s.dap.last_error = Some(LastError {
                code: e.error_code().to_string(),
                message: e.to_string(),
                ts: 0,
            });
            drop(s);
            reject_all_waiters(waiters, e).await;
        }
    }
}

/// Variables fetch helper kept for completeness of the verb mapping (not
/// currently exercised by `stopped` processing, which only pulls scopes).
#[allow(dead_code)]
async fn fetch_variable(client: &Arc<DapClient>, variables_reference: i64) -> Result<Vec<Variable>> {
    let resp = client
        .send_request("variables", Some(json!({"variablesReference": variables_reference})), None)
        .await?;
    serde_json::from_value(resp["variables"].clone()).map_err(|e| Error::ProtocolJsonInvalid(e.to_string()))
}

async fn resolve_ready_waiters(waiters: &Arc<Mutex<Vec<PauseWaiter>>>, epoch: u64) {
    let mut list = waiters.lock().await;
    let mut remaining = Vec::new();
    for mut w in list.drain(..) {
        if w.min_epoch <= epoch {
            if let Some(tx) = w.tx.take() {
                let _ = tx.send(Ok(()));
            }
        } else {
            remaining.push(w);
        }
    }
    *list = remaining;
}

async fn reject_all_waiters(waiters: &Arc<Mutex<Vec<PauseWaiter>>>, err: Error) {
    let mut list = waiters.lock().await;
    for mut w in list.drain(..) {
        if let Some(tx) = w.tx.take() {
            let _ = tx.send(Err(clone_err(&err)));
        }
    }
}

fn clone_err(err: &Error) -> Error {
    Error::SessionTerminated(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_ready_waiters_only_releases_satisfied_epochs() {
        let waiters: Arc<Mutex<Vec<PauseWaiter>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        waiters.lock().await.push(PauseWaiter { min_epoch: 1, tx: Some(tx1) });
        waiters.lock().await.push(PauseWaiter { min_epoch: 5, tx: Some(tx2) });

        resolve_ready_waiters(&waiters, 2).await;

        assert!(rx1.await.unwrap().is_ok());
        assert_eq!(waiters.lock().await.len(), 1);
        drop(rx2);
    }

    #[tokio::test]
    async fn reject_all_waiters_rejects_every_entry() {
        let waiters: Arc<Mutex<Vec<PauseWaiter>>> = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel();
        waiters.lock().await.push(PauseWaiter { min_epoch: 0, tx: Some(tx) });

        reject_all_waiters(&waiters, Error::SessionTerminated("boom".into())).await;

        assert!(rx.await.unwrap().is_err());
        assert!(waiters.lock().await.is_empty());
    }
}
