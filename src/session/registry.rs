//! Session registry (spec §4.5): named session map, `current` pointer,
//! resolution rule, and the open/run/restart/close/attach lifecycle.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::attach::{
    AttachDiagnostics, AttachManager, AttachRequest, ProviderResolver,
};
use crate::error::{Error, Result};
use crate::executor::{CdpExecutor, Executor};
use crate::state::DebuggerState;
use crate::transport::cdp::{discover_targets, pick_target, TargetKind};

use super::breakpoints::{naive_url_pattern, BreakpointSnapshot};

pub struct Session {
    pub name: String,
    executor: RwLock<Executor>,
    managed_child: tokio::sync::Mutex<Option<Child>>,
    managed_command: Option<String>,
}

impl Session {
    fn new(name: String, executor: Executor, managed_command: Option<String>) -> Self {
        Self {
            name,
            executor: RwLock::new(executor),
            managed_child: tokio::sync::Mutex::new(None),
            managed_command,
        }
    }

    pub async fn state(&self) -> Arc<RwLock<DebuggerState>> {
        self.executor.read().await.state()
    }

    pub async fn send(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        self.executor.read().await.send(method, params).await
    }

    pub async fn wait_for_paused(&self, timeout: Duration, min_epoch: Option<u64>) -> Result<()> {
        self.executor.read().await.wait_for_paused(timeout, min_epoch).await
    }

    pub async fn is_connected(&self) -> bool {
        self.executor.read().await.is_connected()
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    current: RwLock<Option<String>>,
    counter: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            counter: AtomicU64::new(0),
        }
    }

    fn next_auto_name(&self) -> String {
        format!("s{}", self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Resolution rule (spec §4.5): explicit name wins; else the sole
    /// session; else `current`; else ambiguous.
    pub async fn resolve(&self, name: Option<&str>) -> Result<Arc<Session>> {
        let sessions = self.sessions.read().await;
        if let Some(name) = name {
            return sessions
                .get(name)
                .cloned()
                .ok_or_else(|| Error::SessionNotFound(name.to_string()));
        }
        if sessions.len() == 1 {
            return Ok(sessions.values().next().cloned().unwrap());
        }
        if let Some(current) = self.current.read().await.clone() {
            if let Some(s) = sessions.get(&current) {
                return Ok(s.clone());
            }
        }
        Err(Error::AmbiguousSession)
    }

    pub async fn list(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// **Use.** Point `current` at an already-registered session by name.
    pub async fn set_current(&self, name: &str) -> Result<()> {
        let sessions = self.sessions.read().await;
        if !sessions.contains_key(name) {
            return Err(Error::SessionNotFound(name.to_string()));
        }
        drop(sessions);
        *self.current.write().await = Some(name.to_string());
        Ok(())
    }

    async fn register(&self, name_hint: Option<String>, executor: Executor, managed_command: Option<String>) -> Result<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let name = match name_hint {
            Some(name) => {
                if sessions.contains_key(&name) {
                    return Err(Error::SessionNameTaken(name));
                }
                name
            }
            None => loop {
                let candidate = self.next_auto_name();
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        let session = Arc::new(Session::new(name.clone(), executor, managed_command));
        sessions.insert(name.clone(), session.clone());
        drop(sessions);
        *self.current.write().await = Some(name);
        Ok(session)
    }

    /// **Open.** Parse `[host:]port [--type node|page] [--target <id>]`,
    /// discover the target's WebSocket URL (or synthesize from an explicit
    /// id), connect a CDP executor, register.
    pub async fn open(
        &self,
        host: &str,
        port: u16,
        kind: Option<TargetKind>,
        target_id: Option<&str>,
    ) -> Result<Arc<Session>> {
        let targets = discover_targets(host, port).await?;
        let ws_url = pick_target(&targets, target_id, kind)?;
        let executor = CdpExecutor::connect(&ws_url).await?;
        self.register(None, Executor::Cdp(executor), None).await
    }

    /// **Run.** Parse a shell command, free a local port, spawn the target
    /// with an inspector argument injected (break-on-entry preferred),
    /// discover its target, connect.
    pub async fn run(&self, command: &str, stop_on_entry: bool) -> Result<Arc<Session>> {
        let parts = shlex::split(command)
            .ok_or_else(|| Error::InvalidRequest(format!("could not parse command: {command}")))?;
        let (program, rest) = parts
            .split_first()
            .ok_or_else(|| Error::InvalidRequest("empty command".into()))?;

        let port = find_free_port()?;
        let inspect_flag = if stop_on_entry {
            format!("--inspect-brk={port}")
        } else {
            format!("--inspect={port}")
        };

        let mut cmd = Command::new(program);
        cmd.arg(&inspect_flag).args(rest);
        cmd.stdin(std::process::Stdio::null());
        let child = cmd.spawn().map_err(Error::Io)?;
        let pid = child.id();

        let ws_url = discover_with_retry("127.0.0.1", port, Duration::from_secs(5)).await?;
        let executor = match CdpExecutor::connect(&ws_url).await {
            Ok(e) => e,
            Err(e) => {
                return Err(e);
            }
        };
        if let Some(pid) = pid {
            executor.state().write().await.pid = Some(pid as i64);
        }

        let session = self.register(None, Executor::Cdp(executor), Some(command.to_string())).await?;
        *session.managed_child.lock().await = Some(child);
        Ok(session)
    }

    /// **Restart.** Only valid for managed CDP sessions: snapshot
    /// breakpoints, disconnect, kill the child, respawn via the recorded
    /// command, reconnect, replay breakpoints. Returns the restored count.
    pub async fn restart(&self, name: Option<&str>) -> Result<usize> {
        let session = self.resolve(name).await?;
        let command = session
            .managed_command
            .clone()
            .ok_or_else(|| Error::InvalidState("restart is only valid for managed sessions".into()))?;

        {
            let executor = session.executor.read().await;
            if !matches!(*executor, Executor::Cdp(_)) {
                return Err(Error::InvalidState("restart is only valid for CDP sessions".into()));
            }
        }

        let snapshot = {
            let state = session.state().await;
            let s = state.read().await;
            BreakpointSnapshot::capture(&s.breakpoints)
        };

        session.executor.read().await.disconnect().await;
        if let Some(mut child) = session.managed_child.lock().await.take() {
            let _ = child.kill().await;
        }

        let parts = shlex::split(&command)
            .ok_or_else(|| Error::InvalidRequest(format!("could not parse command: {command}")))?;
        let (program, rest) = parts
            .split_first()
            .ok_or_else(|| Error::InvalidRequest("empty command".into()))?;
        let port = find_free_port()?;

        let mut cmd = Command::new(program);
        cmd.arg(format!("--inspect-brk={port}")).args(rest);
        cmd.stdin(std::process::Stdio::null());
        let child = cmd.spawn().map_err(Error::Io)?;
        let pid = child.id();

        let ws_url = discover_with_retry("127.0.0.1", port, Duration::from_secs(5)).await?;
        let new_executor = CdpExecutor::connect(&ws_url).await?;
        if let Some(pid) = pid {
            new_executor.state().write().await.pid = Some(pid as i64);
        }

        *session.executor.write().await = Executor::Cdp(new_executor);
        *session.managed_child.lock().await = Some(child);

        let mut restored = 0;
        for bp in &snapshot.breakpoints {
            let url_regex = naive_url_pattern(&bp.file);
            let params = serde_json::json!({
                "urlRegex": url_regex,
                "lineNumber": bp.line,
                "condition": bp.condition,
            });
            match session.send("Debugger.setBreakpointByUrl", Some(params)).await {
                Ok(_) => restored += 1,
                Err(e) => warn!(file = %bp.file, error = %e, "failed to replay breakpoint after restart"),
            }
        }
        Ok(restored)
    }

    /// **Close.** Disconnect, signal the managed child if any, remove, relink `current`.
    pub async fn close(&self, name: Option<&str>) -> Result<()> {
        let session = self.resolve(name).await?;
        session.executor.read().await.disconnect().await;
        if let Some(mut child) = session.managed_child.lock().await.take() {
            let _ = child.kill().await;
        }

        let mut sessions = self.sessions.write().await;
        sessions.remove(&session.name);
        drop(sessions);

        let mut current = self.current.write().await;
        if current.as_deref() == Some(session.name.as_str()) {
            *current = None;
        }
        Ok(())
    }

    /// **Attach (Apple device).** Resolve via `resolver`, reject if the
    /// resolved pid is already attached, run the strategy manager, register
    /// a native session on success.
    pub async fn attach(
        &self,
        request: AttachRequest,
        resolver: &dyn ProviderResolver,
        attach_manager: &AttachManager<'_>,
    ) -> Result<(Arc<Session>, AttachDiagnostics)> {
        let resolve_start = std::time::Instant::now();
        let resolution = resolver.resolve(&request).await?;
        let provider_resolve_ms = resolve_start.elapsed().as_millis() as u64;

        if let Some(pid) = resolution.pid {
            if self.pid_already_attached(pid).await {
                return Err(Error::AttachFailed(format!("pid {pid} is already attached")));
            }
        }

        let (executor, diagnostics) = attach_manager.attach(&request, &resolution, provider_resolve_ms).await;
        match executor {
            Some(executor) => {
                if let Some(pid) = resolution.pid {
                    executor.state().write().await.pid = Some(pid);
                }
                let session = self.register(None, Executor::Dap(executor), None).await?;
                info!(session = %session.name, strategy = ?diagnostics.selected_strategy, "attach succeeded");
                Ok((session, diagnostics))
            }
            None => {
                let hint = match resolution.attach_environment {
                    crate::attach::AttachEnvironment::Simulator => {
                        "simulator attach failed; verify the app is running in the simulator"
                    }
                    crate::attach::AttachEnvironment::Device => {
                        "device attach failed; verify the device is unlocked and trusted"
                    }
                };
                Err(Error::AttachDeniedOrTimeout(format!(
                    "{hint} (see diagnostics: {} attempt(s))",
                    diagnostics.attempts.len()
                )))
            }
        }
    }

    async fn pid_already_attached(&self, pid: i64) -> bool {
        for session in self.sessions.read().await.values() {
            let state = session.state().await;
            if state.read().await.pid == Some(pid) {
                return true;
            }
        }
        false
    }
}

fn find_free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").map_err(Error::Io)?;
    Ok(listener.local_addr().map_err(Error::Io)?.port())
}

async fn discover_with_retry(host: &str, port: u16, timeout: Duration) -> Result<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match discover_targets(host, port).await {
            Ok(targets) if !targets.is_empty() => return pick_target(&targets, None, None),
            _ => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(Error::AttachFailed(format!(
                        "no CDP target discovered on {host}:{port} within {timeout:?}"
                    )));
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_is_ambiguous_when_empty_and_unnamed() {
        let registry = SessionRegistry::new();
        let result = registry.resolve(None).await;
        assert!(matches!(result, Err(Error::AmbiguousSession)));
    }

    #[tokio::test]
    async fn resolve_by_explicit_name_reports_not_found() {
        let registry = SessionRegistry::new();
        let result = registry.resolve(Some("s0")).await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn auto_names_increment() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.next_auto_name(), "s0");
        assert_eq!(registry.next_auto_name(), "s1");
    }

    #[tokio::test]
    async fn set_current_rejects_unknown_name() {
        let registry = SessionRegistry::new();
        let result = registry.set_current("s0").await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }
}
