//! CDP executor: translates the uniform `Executor` capability onto a
//! `CdpClient` and keeps `DebuggerState` in sync with inbound CDP events
//! (spec §4.3 "CDP event handling").

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Notify, RwLock};

use crate::error::{Error, Result};
use crate::state::{CallFrame, ConsoleEntry, DebuggerState, ExceptionEntry, MockRule, NetworkRequest, PageEvent, ScriptInfo, WsFrame};
use crate::transport::cdp::{CdpClient, CdpEvent};

pub struct CdpExecutor {
    client: Arc<CdpClient>,
    state: Arc<RwLock<DebuggerState>>,
    paused_notify: Arc<Notify>,
}

impl CdpExecutor {
    /// Connect, run best-effort domain enable, and start the background
    /// event-fan-out loop that keeps `DebuggerState` current.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Arc::new(crate::transport::cdp::CdpClient::connect(url, Default::default()).await?);
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        {
            let mut s = state.write().await;
            s.connected = true;
            s.cdp.last_ws_url = Some(url.to_string());
        }

        crate::transport::cdp::enable_domains_best_effort(
            &client,
            &["Debugger", "Runtime", "Network", "Page", "Log", "Fetch"],
        )
        .await;

        let executor = Self {
            client: client.clone(),
            state: state.clone(),
            paused_notify: Arc::new(Notify::new()),
        };
        executor.spawn_event_pumps().await;
        Ok(executor)
    }

    pub fn state(&self) -> Arc<RwLock<DebuggerState>> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub async fn disconnect(&self) {
        let mut s = self.state.write().await;
        s.on_disconnected();
    }

    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.client.is_connected() {
            return Err(Error::NotConnected);
        }
        self.client.send_command(method, params).await
    }

    pub async fn wait_for_paused(&self, timeout: Duration) -> Result<()> {
        if self.state.read().await.paused {
            return Ok(());
        }
        match tokio::time::timeout(timeout, self.paused_notify.notified()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::WaitForPauseTimeout),
        }
    }

    async fn spawn_event_pumps(&self) {
        for method in [
            "Debugger.paused",
            "Debugger.resumed",
            "Debugger.scriptParsed",
            "Runtime.consoleAPICalled",
            "Runtime.exceptionThrown",
            "Network.requestWillBeSent",
            "Network.responseReceived",
            "Network.loadingFinished",
            "Page.frameNavigated",
            "Page.loadEventFired",
            "Network.webSocketFrameSent",
            "Network.webSocketFrameReceived",
            "Log.entryAdded",
        ] {
            let Ok(mut rx) = self.client.subscribe(method).await else {
                continue;
            };
            let state = self.state.clone();
            let paused_notify = self.paused_notify.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    handle_event(&state, &paused_notify, event).await;
                }
            });
        }

        if let Ok(mut rx) = self.client.subscribe("Fetch.requestPaused").await {
            let state = self.state.clone();
            let client = self.client.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    handle_fetch_paused(&state, &client, event).await;
                }
            });
        }
    }
}

/// Consults `mock_rules`: on a match, fulfills the request with the
/// configured status/body; otherwise lets it continue unmodified.
async fn handle_fetch_paused(state: &Arc<RwLock<DebuggerState>>, client: &Arc<CdpClient>, event: CdpEvent) {
    let request_id = event.params["requestId"].as_str().unwrap_or_default().to_string();
    let url = event.params["request"]["url"].as_str().unwrap_or_default().to_string();

    let matched = {
        let s = state.read().await;
        find_matching_rule(&s.cdp.mock_rules, &url)
    };

    let result = if let Some(rule) = matched {
        use base64::Engine;
        let body = base64::engine::general_purpose::STANDARD.encode(rule.body.as_bytes());
        client
            .send_command(
                "Fetch.fulfillRequest",
                Some(serde_json::json!({"requestId": request_id, "responseCode": rule.status, "body": body})),
            )
            .await
    } else {
        client
            .send_command("Fetch.continueRequest", Some(serde_json::json!({"requestId": request_id})))
            .await
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "fetch interception response failed");
    }
}

fn find_matching_rule(rules: &[MockRule], url: &str) -> Option<MockRule> {
    rules
        .iter()
        .find(|rule| regex::Regex::new(&rule.url_pattern).map(|re| re.is_match(url)).unwrap_or(false))
        .cloned()
}

async fn handle_event(state: &Arc<RwLock<DebuggerState>>, paused_notify: &Arc<Notify>, event: CdpEvent) {
    let mut s = state.write().await;
    match event.method.as_str() {
        "Debugger.paused" => {
            s.paused = true;
            if let Some(frames) = event.params.get("callFrames").and_then(|v| v.as_array()) {
                s.call_frames = frames
                    .iter()
                    .map(|f| CallFrame {
                        frame_id: f["callFrameId"].as_str().unwrap_or_default().to_string(),
                        function: f["functionName"].as_str().unwrap_or_default().to_string(),
                        url: f["url"].as_str().map(str::to_string),
                        file: None,
                        line: f["location"]["lineNumber"].as_i64().unwrap_or(0),
                        col: f["location"]["columnNumber"].as_i64().unwrap_or(0),
                        script_id: f["location"]["scriptId"].as_str().map(str::to_string),
                        scope_chain: f["scopeChain"].as_array().cloned().unwrap_or_default(),
                        this_object_id: f["this"]["objectId"].as_str().map(str::to_string),
                    })
                    .collect();
            }
            drop(s);
            paused_notify.notify_waiters();
        }
        "Debugger.resumed" => {
            s.paused = false;
            s.call_frames.clear();
        }
        "Debugger.scriptParsed" => {
            let id = event.params["scriptId"].as_str().unwrap_or_default().to_string();
            s.scripts.insert(
                id.clone(),
                ScriptInfo {
                    id,
                    file: None,
                    url: event.params["url"].as_str().map(str::to_string),
                    lines: event.params["endLine"].as_i64(),
                    source_map: event.params["sourceMapURL"].as_str().map(str::to_string),
                    is_module: event.params["isModule"].as_bool().unwrap_or(false),
                },
            );
        }
        "Runtime.consoleAPICalled" => {
            let text = event.params["args"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .map(|v| v["value"].as_str().unwrap_or_default().to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            s.console.push(ConsoleEntry {
                ts: event.params["timestamp"].as_i64().unwrap_or(0),
                level: event.params["type"].as_str().unwrap_or("log").to_string(),
                text,
            });
        }
        "Runtime.exceptionThrown" => {
            let detail = &event.params["exceptionDetails"];
            s.exceptions.push(ExceptionEntry {
                ts: event.params["timestamp"].as_i64().unwrap_or(0),
                text: detail["text"].as_str().unwrap_or_default().to_string(),
                stack: detail["stackTrace"]["description"].as_str().map(str::to_string),
            });
        }
        "Network.requestWillBeSent" => {
            let request_id = event.params["requestId"].as_str().unwrap_or_default().to_string();
            s.cdp.record_network_request(NetworkRequest {
                request_id,
                url: event.params["request"]["url"].as_str().unwrap_or_default().to_string(),
                method: event.params["request"]["method"].as_str().unwrap_or_default().to_string(),
                status: None,
                mime_type: None,
                finished: false,
            });
        }
        "Network.responseReceived" => {
            let request_id = event.params["requestId"].as_str().unwrap_or_default().to_string();
            if let Some(existing) = s.cdp.network_requests.get(&request_id).cloned() {
                s.cdp.record_network_request(NetworkRequest {
                    request_id,
                    url: existing.url,
                    method: existing.method,
                    status: event.params["response"]["status"].as_i64(),
                    mime_type: event.params["response"]["mimeType"].as_str().map(str::to_string),
                    finished: false,
                });
            }
        }
        "Network.loadingFinished" => {
            let request_id = event.params["requestId"].as_str().unwrap_or_default().to_string();
            if let Some(mut existing) = s.cdp.network_requests.get(&request_id).cloned() {
                existing.finished = true;
                s.cdp.record_network_request(existing);
            }
        }
        "Page.frameNavigated" | "Page.loadEventFired" => {
            let name = event.method.clone();
            let ts = event.params["timestamp"].as_i64().unwrap_or(0);
            s.cdp.page_events.push(PageEvent {
                ts,
                name,
                data: event.params.clone(),
            });
        }
        "Log.entryAdded" => {
            let entry = &event.params["entry"];
            s.console.push(ConsoleEntry {
                ts: entry["timestamp"].as_i64().unwrap_or(0),
                level: entry["level"].as_str().unwrap_or("info").to_string(),
                text: entry["text"].as_str().unwrap_or_default().to_string(),
            });
        }
        "Network.webSocketFrameSent" | "Network.webSocketFrameReceived" => {
            let sent = event.method == "Network.webSocketFrameSent";
            s.cdp.ws_frames.push(WsFrame {
                ts: event.params["timestamp"].as_i64().unwrap_or(0),
                request_id: event.params["requestId"].as_str().unwrap_or_default().to_string(),
                opcode: event.params["response"]["opcode"].as_i64(),
                payload: event.params["response"]["payloadData"].as_str().unwrap_or_default().to_string(),
                sent,
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DebuggerState;
    use serde_json::json;

    #[tokio::test]
    async fn debugger_paused_sets_paused_and_notifies() {
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        let notify = Arc::new(Notify::new());
        let event = CdpEvent {
            method: "Debugger.paused".into(),
            params: json!({"callFrames": [{"callFrameId": "1", "functionName": "main", "location": {"scriptId": "1", "lineNumber": 3, "columnNumber": 0}}]}),
            session_id: None,
        };
        handle_event(&state, &notify, event).await;
        let s = state.read().await;
        assert!(s.paused);
        assert_eq!(s.call_frames.len(), 1);
        assert_eq!(s.call_frames[0].function, "main");
    }

    #[tokio::test]
    async fn debugger_resumed_clears_frames() {
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        let notify = Arc::new(Notify::new());
        state.write().await.paused = true;
        handle_event(
            &state,
            &notify,
            CdpEvent {
                method: "Debugger.resumed".into(),
                params: json!({}),
                session_id: None,
            },
        )
        .await;
        assert!(!state.read().await.paused);
    }

    #[tokio::test]
    async fn network_lifecycle_tracks_single_request() {
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        let notify = Arc::new(Notify::new());
        handle_event(
            &state,
            &notify,
            CdpEvent {
                method: "Network.requestWillBeSent".into(),
                params: json!({"requestId": "r1", "request": {"url": "http://x", "method": "GET"}}),
                session_id: None,
            },
        )
        .await;
        handle_event(
            &state,
            &notify,
            CdpEvent {
                method: "Network.responseReceived".into(),
                params: json!({"requestId": "r1", "response": {"status": 200, "mimeType": "text/html"}}),
                session_id: None,
            },
        )
        .await;
        let s = state.read().await;
        assert_eq!(s.cdp.network_order.len(), 1);
        assert_eq!(s.cdp.network_requests["r1"].status, Some(200));
    }

    #[tokio::test]
    async fn log_entry_added_appends_a_console_entry() {
        let state = Arc::new(RwLock::new(DebuggerState::new()));
        let notify = Arc::new(Notify::new());
        handle_event(
            &state,
            &notify,
            CdpEvent {
                method: "Log.entryAdded".into(),
                params: json!({"entry": {"timestamp": 5, "level": "warning", "text": "slow response"}}),
                session_id: None,
            },
        )
        .await;
        let s = state.read().await;
        assert_eq!(s.console.len(), 1);
        let entry = s.console.iter().next().unwrap();
        assert_eq!(entry.level, "warning");
        assert_eq!(entry.text, "slow response");
    }

    #[test]
    fn find_matching_rule_picks_the_first_pattern_matching_the_url() {
        let rules = vec![
            MockRule {
                url_pattern: r"\.css$".into(),
                status: 200,
                body: "ignored".into(),
            },
            MockRule {
                url_pattern: r"/api/.*\.json$".into(),
                status: 404,
                body: "not found".into(),
            },
        ];
        let found = find_matching_rule(&rules, "https://example.com/api/users.json").unwrap();
        assert_eq!(found.status, 404);
    }

    #[test]
    fn find_matching_rule_returns_none_when_nothing_matches() {
        let rules = vec![MockRule {
            url_pattern: r"\.css$".into(),
            status: 200,
            body: String::new(),
        }];
        assert!(find_matching_rule(&rules, "https://example.com/app.js").is_none());
    }
}
