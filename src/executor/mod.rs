//! Session executor (C2): adapts protocol-specific verbs to the uniform
//! `Executor` capability and owns the per-session `DebuggerState`.
//!
//! Realized as a tagged two-variant enum rather than a trait object, per
//! SPEC_FULL.md §9's reimplementation note: the dispatcher discriminates on
//! the tag once and then proceeds with type-safe fields.

pub mod cdp;
pub mod dap;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::state::DebuggerState;

pub use cdp::CdpExecutor;
pub use dap::DapExecutor;

pub enum Executor {
    Cdp(CdpExecutor),
    Dap(DapExecutor),
}

impl Executor {
    pub fn state(&self) -> Arc<RwLock<DebuggerState>> {
        match self {
            Executor::Cdp(e) => e.state(),
            Executor::Dap(e) => e.state(),
        }
    }

    pub async fn disconnect(&self) {
        match self {
            Executor::Cdp(e) => e.disconnect().await,
            Executor::Dap(e) => e.disconnect().await,
        }
    }

    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        match self {
            Executor::Cdp(e) => e.send(method, params).await,
            Executor::Dap(e) => e.send(method, params).await,
        }
    }

    /// Resolve once `paused ∧ stopEpoch ≥ minEpoch` (DAP) or simply `paused`
    /// (CDP, which has no cross-stop fencing requirement in this spec).
    pub async fn wait_for_paused(&self, timeout: Duration, min_epoch: Option<u64>) -> Result<()> {
        match self {
            Executor::Cdp(e) => e.wait_for_paused(timeout).await,
            Executor::Dap(e) => e.wait_for_paused(timeout, min_epoch.unwrap_or(0)).await,
        }
    }

    pub fn is_connected(&self) -> bool {
        match self {
            Executor::Cdp(e) => e.is_connected(),
            Executor::Dap(e) => e.is_connected(),
        }
    }
}
