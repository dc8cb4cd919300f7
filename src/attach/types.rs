//! Attach request/resolution types (spec §3 "AttachRequest / ProviderResolutionResult").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachStrategy {
    Auto,
    DeviceProcess,
    GdbRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachEnvironment {
    Device,
    Simulator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachRequest {
    pub provider: String,
    pub platform: String,
    pub bundle_id: String,
    pub device_id: Option<String>,
    pub pid: Option<i64>,
    pub launch: bool,
    pub attach_strategy: AttachStrategy,
    pub timeout_ms: Option<u64>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResolutionResult {
    pub provider: String,
    pub platform: String,
    pub device_id: String,
    pub bundle_id: String,
    pub pid: Option<i64>,
    pub attach_protocol: String,
    pub attach_environment: AttachEnvironment,
    pub metadata: Value,
}

/// Resolves an `AttachRequest` to a concrete device/pid (spec's `HostTooling`
/// capability — the actual device/simulator enumeration shell-outs are a
/// Non-goal; this seam is what the attach strategy manager is built against).
#[async_trait::async_trait]
pub trait ProviderResolver: Send + Sync {
    async fn resolve(&self, request: &AttachRequest) -> crate::error::Result<ProviderResolutionResult>;
}
