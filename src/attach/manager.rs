//! Attach strategy manager (spec §4.4): runs the ordered attempt sequence,
//! validates the stop-state handshake, and accumulates diagnostics.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::DapExecutor;

use super::diagnostics::{AttachDiagnostics, AttemptDiagnostic};
use super::strategy::strategy_order;
use super::timeout::command_timeout;
use super::types::{AttachEnvironment, AttachRequest, AttachStrategy, ProviderResolutionResult};

/// Device-process / gdb-remote executor construction, injected so tests can
/// substitute a fake executor without spawning a real `lldb`/adapter process.
#[async_trait]
pub trait CreateExecutor: Send + Sync {
    async fn attach_lldb_to_pid(&self, pid: i64, attach_commands: Option<Vec<String>>) -> Result<DapExecutor>;

    async fn attach_gdb_remote(
        &self,
        port: u16,
        hostname: &str,
        pid: Option<i64>,
        timeout_secs: u64,
    ) -> Result<DapExecutor>;
}

#[async_trait]
pub trait DiscoverDebugProxyPort: Send + Sync {
    async fn discover(&self, device_id: &str) -> Result<u16>;
}

pub struct AttachManager<'a> {
    pub create_executor: &'a dyn CreateExecutor,
    pub discover_debug_proxy_port: &'a dyn DiscoverDebugProxyPort,
}

impl<'a> AttachManager<'a> {
    pub fn new(
        create_executor: &'a dyn CreateExecutor,
        discover_debug_proxy_port: &'a dyn DiscoverDebugProxyPort,
    ) -> Self {
        Self {
            create_executor,
            discover_debug_proxy_port,
        }
    }

    /// Run the ordered attempt sequence for `request` against an
    /// already-resolved `resolution`. Returns the attached executor, the
    /// strategy that succeeded, and the accumulated diagnostics.
    pub async fn attach(
        &self,
        request: &AttachRequest,
        resolution: &ProviderResolutionResult,
        provider_resolve_ms: u64,
    ) -> (Option<DapExecutor>, AttachDiagnostics) {
        let total_start = Instant::now();
        let mut diagnostics = AttachDiagnostics::new(request.attach_strategy, provider_resolve_ms);

        let order = match strategy_order(request.attach_strategy, resolution) {
            Ok(order) => order,
            Err(e) => {
                diagnostics.attempts.push(AttemptDiagnostic {
                    strategy: request.attach_strategy,
                    duration_ms: 0,
                    success: false,
                    error: Some(e.to_string()),
                });
                diagnostics.total_ms = total_start.elapsed().as_millis() as u64;
                return (None, diagnostics);
            }
        };

        let base_timeout = request.timeout_ms.map(Duration::from_millis);
        let per_attempt_timeout = command_timeout(base_timeout, order.len());

        for strategy in order {
            let attempt_start = Instant::now();
            let result = tokio::time::timeout(per_attempt_timeout, self.attempt(strategy, request, resolution)).await;

            let outcome = match result {
                Ok(inner) => inner,
                Err(_) => Err(Error::AttachFailed(format!(
                    "attach attempt ({strategy:?}) exceeded {per_attempt_timeout:?}"
                ))),
            };

            let duration_ms = attempt_start.elapsed().as_millis() as u64;
            match outcome {
                Ok(executor) => {
                    diagnostics.attempts.push(AttemptDiagnostic {
                        strategy,
                        duration_ms,
                        success: true,
                        error: None,
                    });
                    diagnostics.selected_strategy = Some(strategy);
                    diagnostics.total_ms = total_start.elapsed().as_millis() as u64;
                    return (Some(executor), diagnostics);
                }
                Err(e) => {
                    diagnostics.attempts.push(AttemptDiagnostic {
                        strategy,
                        duration_ms,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        diagnostics.total_ms = total_start.elapsed().as_millis() as u64;
        (None, diagnostics)
    }

    async fn attempt(
        &self,
        strategy: AttachStrategy,
        request: &AttachRequest,
        resolution: &ProviderResolutionResult,
    ) -> Result<DapExecutor> {
        let pid = resolution.pid.ok_or_else(|| Error::AttachFailed("resolution carries no pid".into()))?;

        let executor = match strategy {
            AttachStrategy::DeviceProcess => {
                let attach_commands = match resolution.attach_environment {
                    AttachEnvironment::Device => Some(vec![
                        format!("device select {}", resolution.device_id),
                        format!("device process attach --pid {pid}"),
                    ]),
                    AttachEnvironment::Simulator => None,
                };
                self.create_executor.attach_lldb_to_pid(pid, attach_commands).await?
            }
            AttachStrategy::GdbRemote => {
                let port = self.discover_debug_proxy_port.discover(&resolution.device_id).await?;
                let timeout_secs = request
                    .timeout_ms
                    .map(|ms| ((ms + 999) / 1000).max(1))
                    .unwrap_or(30);
                self.create_executor
                    .attach_gdb_remote(port, "127.0.0.1", Some(pid), timeout_secs)
                    .await?
            }
            AttachStrategy::Auto => {
                return Err(Error::Internal("strategy_order never yields Auto".into()));
            }
        };

        match validate_stop_handshake(&executor).await {
            Ok(()) => Ok(executor),
            Err(e) => {
                executor.disconnect().await;
                Err(e)
            }
        }
    }
}

/// `state.paused ∧ at least one active thread ∧ at least one call frame`
/// (spec §4.4 "stop-state handshake"). Failure disconnects the executor and
/// rolls back its DAP substate — `disconnect()` already clears it.
async fn validate_stop_handshake(executor: &DapExecutor) -> Result<()> {
    let state = executor.state();
    let s = state.read().await;
    if !s.paused {
        Err(Error::AttachFailed("attach handshake failed: target is not paused".into()))
    } else if s.active_thread_count() < 1 {
        Err(Error::AttachFailed("attach handshake failed: no active thread".into()))
    } else if s.call_frames.is_empty() {
        Err(Error::AttachFailed("attach handshake failed: no call frames available".into()))
    } else {
        Ok(())
    }
}
