//! Concrete `HostTooling`-backed implementations of the attach pipeline's
//! injectable seams. Device/simulator enumeration is a Non-goal in depth —
//! this shells out to a single configured binary and trusts its structured
//! JSON output rather than reimplementing platform-specific discovery.

use serde_json::Value;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::executor::DapExecutor;

use super::manager::{CreateExecutor, DiscoverDebugProxyPort};
use super::types::{AttachRequest, ProviderResolutionResult, ProviderResolver};

/// `devices` CLI command: lists connected devices/simulators by shelling out
/// to the same configured tool with a `devices` subcommand.
pub async fn list_devices(tool_path: &str) -> Result<Value> {
    let output = Command::new(tool_path)
        .arg("devices")
        .output()
        .await
        .map_err(|e| Error::ProviderError(format!("devices spawn failed: {e}")))?;
    if !output.status.success() {
        return Err(Error::ProviderError(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    serde_json::from_slice(&output.stdout)
        .map_err(|e| Error::ProviderError(format!("malformed devices listing: {e}")))
}

/// Resolves bundle id -> (device, pid) by shelling out to a configured
/// device-tooling binary and parsing one JSON object from its stdout.
pub struct HostToolingResolver {
    pub tool_path: String,
}

#[async_trait::async_trait]
impl ProviderResolver for HostToolingResolver {
    async fn resolve(&self, request: &AttachRequest) -> Result<ProviderResolutionResult> {
        let output = Command::new(&self.tool_path)
            .arg("resolve")
            .arg("--platform")
            .arg(&request.platform)
            .arg("--bundle-id")
            .arg(&request.bundle_id)
            .args(request.device_id.iter().flat_map(|id| ["--device-id", id]))
            .output()
            .await
            .map_err(|e| Error::ProviderError(format!("host tooling spawn failed: {e}")))?;

        if !output.status.success() {
            return Err(Error::DeviceNotFound(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::ProviderError(format!("malformed host tooling resolution: {e}")))
    }
}

/// `discoverDebugProxyPort(deviceId)`: shells out to the same tool with a
/// `proxy-port` subcommand and parses its single-line numeric stdout.
pub struct HostToolingPortDiscoverer {
    pub tool_path: String,
}

#[async_trait::async_trait]
impl DiscoverDebugProxyPort for HostToolingPortDiscoverer {
    async fn discover(&self, device_id: &str) -> Result<u16> {
        let output = Command::new(&self.tool_path)
            .arg("proxy-port")
            .arg("--device-id")
            .arg(device_id)
            .output()
            .await
            .map_err(|e| Error::ProviderError(format!("proxy-port spawn failed: {e}")))?;
        if !output.status.success() {
            return Err(Error::ProviderError(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .map_err(|e| Error::ProviderError(format!("non-numeric proxy port: {e}")))
    }
}

/// Constructs DAP executors for `device-process`/`gdb-remote` attach attempts
/// by spawning the configured DAP adapter binary (spec §4.4 steps 2-3).
pub struct LldbCreateExecutor {
    pub adapter_path: String,
}

#[async_trait::async_trait]
impl CreateExecutor for LldbCreateExecutor {
    async fn attach_lldb_to_pid(&self, pid: i64, attach_commands: Option<Vec<String>>) -> Result<DapExecutor> {
        let mut args = serde_json::json!({ "pid": pid });
        if let Some(commands) = attach_commands {
            args["attachCommands"] = serde_json::Value::Array(
                commands.into_iter().map(serde_json::Value::String).collect(),
            );
        }
        DapExecutor::attach(&self.adapter_path, &[], args, std::time::Duration::from_secs(30)).await
    }

    async fn attach_gdb_remote(
        &self,
        port: u16,
        hostname: &str,
        pid: Option<i64>,
        timeout_secs: u64,
    ) -> Result<DapExecutor> {
        let mut args = serde_json::json!({
            "gdb-remote-port": port,
            "gdb-remote-hostname": hostname,
            "timeout": timeout_secs,
        });
        if let Some(pid) = pid {
            args["pid"] = serde_json::Value::from(pid);
        }
        DapExecutor::attach(
            &self.adapter_path,
            &[],
            args,
            std::time::Duration::from_secs(timeout_secs),
        )
        .await
    }
}
