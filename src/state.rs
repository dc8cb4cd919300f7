//! `DebuggerState`: the aggregate observation of a single session's target.
//!
//! Owned exclusively by that session's executor; virtual tables (`crate::query::tables`)
//! only ever borrow it for reads. See the ownership note in SPEC_FULL.md §9.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_NETWORK_REQUESTS: usize = 10_000;
const MAX_WS_FRAMES: usize = 5_000;
const MAX_PAGE_EVENTS: usize = 5_000;
const MAX_CONSOLE_ENTRIES: usize = 5_000;
const MAX_EXCEPTION_ENTRIES: usize = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFrame {
    pub frame_id: String,
    pub function: String,
    pub url: Option<String>,
    pub file: Option<String>,
    pub line: i64,
    pub col: i64,
    pub script_id: Option<String>,
    pub scope_chain: Vec<Value>,
    pub this_object_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncFrame {
    pub id: String,
    pub function: String,
    pub file: Option<String>,
    pub line: i64,
    pub parent_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub id: String,
    pub file: Option<String>,
    pub url: Option<String>,
    pub lines: Option<i64>,
    pub source_map: Option<String>,
    pub is_module: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBreakpoint {
    pub id: String,
    pub file: String,
    pub line: i64,
    pub condition: Option<String>,
    pub hits: u64,
    pub enabled: bool,
    pub native_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub ts: i64,
    pub level: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub ts: i64,
    pub text: String,
    pub stack: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub request_id: String,
    pub url: String,
    pub method: String,
    pub status: Option<i64>,
    pub mime_type: Option<String>,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEvent {
    pub ts: i64,
    pub name: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrame {
    pub ts: i64,
    pub request_id: String,
    pub opcode: Option<i64>,
    pub payload: String,
    pub sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    pub js: Value,
    pub css: Value,
    pub captured_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MockRule {
    pub url_pattern: String,
    pub status: u16,
    pub body: String,
}

/// Bounded append-only ring buffer: push evicts the oldest entry once full.
#[derive(Debug, Clone, Default)]
pub struct Bounded<T> {
    cap: usize,
    items: VecDeque<T>,
}

impl<T> Bounded<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.cap {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DapPhase {
    Starting,
    Configuring,
    Running,
    Paused,
    Terminated,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopDescriptor {
    pub reason: String,
    pub thread_id: i64,
    pub ts: i64,
}

/// DAP-specific substate: phase machine, active thread, and the `stopEpoch`
/// fencing token consumed by `executor::dap`'s pause-waiter discipline.
#[derive(Debug, Clone)]
pub struct DapSubstate {
    pub phase: DapPhase,
    pub active_thread_id: Option<i64>,
    pub threads: Vec<i64>,
    pub modules: Vec<Value>,
    pub last_stop: Option<StopDescriptor>,
    pub last_error: Option<LastError>,
    pub stop_epoch: u64,
}

impl Default for DapSubstate {
    fn default() -> Self {
        Self {
            phase: DapPhase::Starting,
            active_thread_id: None,
            threads: Vec::new(),
            modules: Vec::new(),
            last_stop: None,
            last_error: None,
            stop_epoch: 0,
        }
    }
}

/// CDP-specific substate: network/page/websocket history plus coverage.
#[derive(Debug, Clone, Default)]
pub struct CdpSubstate {
    pub last_ws_url: Option<String>,
    pub network_requests: HashMap<String, NetworkRequest>,
    pub network_order: Bounded<String>,
    pub page_events: Bounded<PageEvent>,
    pub ws_frames: Bounded<WsFrame>,
    pub coverage: Option<CoverageSnapshot>,
    pub mock_rules: Vec<MockRule>,
}

impl CdpSubstate {
    pub fn new() -> Self {
        Self {
            network_order: Bounded::new(MAX_NETWORK_REQUESTS),
            page_events: Bounded::new(MAX_PAGE_EVENTS),
            ws_frames: Bounded::new(MAX_WS_FRAMES),
            ..Default::default()
        }
    }

    pub fn record_network_request(&mut self, req: NetworkRequest) {
        if !self.network_requests.contains_key(&req.request_id) {
            self.network_order.push(req.request_id.clone());
        }
        self.network_requests.insert(req.request_id.clone(), req);
    }
}

/// The aggregate observation of one session's target. See SPEC_FULL.md §3.
#[derive(Debug, Clone)]
pub struct DebuggerState {
    pub connected: bool,
    pub paused: bool,
    pub pid: Option<i64>,
    pub managed_command: Option<String>,

    pub call_frames: Vec<CallFrame>,
    pub async_stack: Vec<AsyncFrame>,
    pub scripts: HashMap<String, ScriptInfo>,
    pub breakpoints: HashMap<String, StoredBreakpoint>,

    pub console: Bounded<ConsoleEntry>,
    pub exceptions: Bounded<ExceptionEntry>,

    pub cdp: CdpSubstate,
    pub dap: DapSubstate,
}

impl Default for DebuggerState {
    fn default() -> Self {
        Self {
            connected: false,
            paused: false,
            pid: None,
            managed_command: None,
            call_frames: Vec::new(),
            async_stack: Vec::new(),
            scripts: HashMap::new(),
            breakpoints: HashMap::new(),
            console: Bounded::new(MAX_CONSOLE_ENTRIES),
            exceptions: Bounded::new(MAX_EXCEPTION_ENTRIES),
            cdp: CdpSubstate::new(),
            dap: DapSubstate::default(),
        }
    }
}

impl DebuggerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked whenever the owning transport closes: `connected ⇒ false`,
    /// `paused ⇒ false`, frames cleared (spec §3 invariant).
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.paused = false;
        self.call_frames.clear();
        self.async_stack.clear();
    }

    pub fn active_thread_count(&self) -> usize {
        self.dap.threads.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_disconnected_clears_pause_and_frames() {
        let mut s = DebuggerState::new();
        s.connected = true;
        s.paused = true;
        s.call_frames.push(CallFrame {
            frame_id: "1".into(),
            function: "main".into(),
            url: None,
            file: None,
            line: 1,
            col: 0,
            script_id: None,
            scope_chain: vec![],
            this_object_id: None,
        });
        s.on_disconnected();
        assert!(!s.connected);
        assert!(!s.paused);
        assert!(s.call_frames.is_empty());
    }

    #[test]
    fn bounded_evicts_oldest() {
        let mut b: Bounded<i32> = Bounded::new(2);
        b.push(1);
        b.push(2);
        b.push(3);
        let items: Vec<_> = b.iter().copied().collect();
        assert_eq!(items, vec![2, 3]);
    }

    #[test]
    fn cdp_substate_tracks_network_order_once_per_request() {
        let mut cdp = CdpSubstate::new();
        cdp.record_network_request(NetworkRequest {
            request_id: "r1".into(),
            url: "http://x".into(),
            method: "GET".into(),
            status: None,
            mime_type: None,
            finished: false,
        });
        cdp.record_network_request(NetworkRequest {
            request_id: "r1".into(),
            url: "http://x".into(),
            method: "GET".into(),
            status: Some(200),
            mime_type: Some("text/html".into()),
            finished: true,
        });
        assert_eq!(cdp.network_order.len(), 1);
        assert!(cdp.network_requests.get("r1").unwrap().finished);
    }
}
