//! Exercises `AttachManager::attach`'s ordered-attempt and diagnostics
//! accumulation against fake `CreateExecutor`/`DiscoverDebugProxyPort`
//! collaborators, without spawning a real lldb/adapter process.

use async_trait::async_trait;
use dbgd::attach::{
    AttachEnvironment, AttachManager, AttachRequest, AttachStrategy, CreateExecutor, DiscoverDebugProxyPort,
    ProviderResolutionResult,
};
use dbgd::error::{Error, Result};
use dbgd::executor::DapExecutor;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

struct AlwaysFailsExecutor {
    device_process_calls: AtomicUsize,
    gdb_remote_calls: AtomicUsize,
}

impl AlwaysFailsExecutor {
    fn new() -> Self {
        Self {
            device_process_calls: AtomicUsize::new(0),
            gdb_remote_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CreateExecutor for AlwaysFailsExecutor {
    async fn attach_lldb_to_pid(&self, _pid: i64, _attach_commands: Option<Vec<String>>) -> Result<DapExecutor> {
        self.device_process_calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::AttachFailed("no lldb available in test".into()))
    }

    async fn attach_gdb_remote(&self, _port: u16, _hostname: &str, _pid: Option<i64>, _timeout_secs: u64) -> Result<DapExecutor> {
        self.gdb_remote_calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::AttachFailed("no gdb-remote adapter in test".into()))
    }
}

struct FixedPortDiscoverer;

#[async_trait]
impl DiscoverDebugProxyPort for FixedPortDiscoverer {
    async fn discover(&self, _device_id: &str) -> Result<u16> {
        Ok(12345)
    }
}

fn device_resolution() -> ProviderResolutionResult {
    ProviderResolutionResult {
        provider: "apple".into(),
        platform: "ios".into(),
        device_id: "dev1".into(),
        bundle_id: "com.example.app".into(),
        pid: Some(42),
        attach_protocol: "dap".into(),
        attach_environment: AttachEnvironment::Device,
        metadata: json!({}),
    }
}

fn request(strategy: AttachStrategy) -> AttachRequest {
    AttachRequest {
        provider: "apple".into(),
        platform: "ios".into(),
        bundle_id: "com.example.app".into(),
        device_id: Some("dev1".into()),
        pid: Some(42),
        launch: false,
        attach_strategy: strategy,
        timeout_ms: Some(50),
        verbose: false,
    }
}

#[tokio::test]
async fn auto_strategy_tries_device_process_then_gdb_remote_and_records_both_failures() {
    let create_executor = AlwaysFailsExecutor::new();
    let port_discoverer = FixedPortDiscoverer;
    let manager = AttachManager::new(&create_executor, &port_discoverer);

    let (executor, diagnostics) = manager.attach(&request(AttachStrategy::Auto), &device_resolution(), 5).await;

    assert!(executor.is_none());
    assert_eq!(create_executor.device_process_calls.load(Ordering::SeqCst), 1);
    assert_eq!(create_executor.gdb_remote_calls.load(Ordering::SeqCst), 1);
    assert_eq!(diagnostics.attempts.len(), 2);
    assert_eq!(diagnostics.attempts[0].strategy, AttachStrategy::DeviceProcess);
    assert_eq!(diagnostics.attempts[1].strategy, AttachStrategy::GdbRemote);
    assert!(diagnostics.attempts.iter().all(|a| !a.success));
    assert!(diagnostics.selected_strategy.is_none());
}

#[tokio::test]
async fn explicit_device_process_strategy_never_tries_gdb_remote() {
    let create_executor = AlwaysFailsExecutor::new();
    let port_discoverer = FixedPortDiscoverer;
    let manager = AttachManager::new(&create_executor, &port_discoverer);

    let (executor, diagnostics) = manager
        .attach(&request(AttachStrategy::DeviceProcess), &device_resolution(), 0)
        .await;

    assert!(executor.is_none());
    assert_eq!(create_executor.device_process_calls.load(Ordering::SeqCst), 1);
    assert_eq!(create_executor.gdb_remote_calls.load(Ordering::SeqCst), 0);
    assert_eq!(diagnostics.attempts.len(), 1);
}

#[tokio::test]
async fn gdb_remote_against_a_simulator_is_rejected_before_any_attempt() {
    let create_executor = AlwaysFailsExecutor::new();
    let port_discoverer = FixedPortDiscoverer;
    let manager = AttachManager::new(&create_executor, &port_discoverer);

    let mut resolution = device_resolution();
    resolution.attach_environment = AttachEnvironment::Simulator;

    let (executor, diagnostics) = manager.attach(&request(AttachStrategy::GdbRemote), &resolution, 0).await;

    assert!(executor.is_none());
    assert_eq!(create_executor.device_process_calls.load(Ordering::SeqCst), 0);
    assert_eq!(create_executor.gdb_remote_calls.load(Ordering::SeqCst), 0);
    assert_eq!(diagnostics.attempts.len(), 1);
    assert!(!diagnostics.attempts[0].success);
}
