//! WebSocket transport actor for the CDP variant of C1.
//!
//! A single task owns the WebSocket duplex stream; callers interact with it
//! through a cloneable [`TransportHandle`] that sends [`TransportCommand`]s
//! over an `mpsc` channel. This mirrors the actor/handle split used for
//! browser automation elsewhere in the corpus, generalized from a
//! CLI-verb boundary to this crate's session/executor boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{Error, Result};

use super::types::{CdpCommand, CdpEvent, MessageKind, RawCdpMessage};

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
        }
    }
}

struct PendingRequest {
    response_tx: oneshot::Sender<Result<serde_json::Value>>,
    method: String,
    deadline: Instant,
}

pub enum TransportCommand {
    SendCommand {
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<serde_json::Value>>,
        deadline: Instant,
    },
    Subscribe {
        method: String,
        session_id: Option<String>,
        event_tx: mpsc::Sender<CdpEvent>,
    },
    Shutdown,
}

/// Cloneable front for the transport actor.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    command_tx: mpsc::Sender<TransportCommand>,
    connected: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl TransportHandle {
    pub async fn send(&self, cmd: TransportCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| Error::TransportClosed("actor task has exited".into()))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Connect to `url` and spawn the background actor task.
pub async fn spawn_transport(
    url: &str,
    channel_capacity: usize,
    _reconnect: ReconnectConfig,
    connect_timeout: Duration,
) -> Result<TransportHandle> {
    let (ws_stream, _resp) = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| Error::RequestTimeout(format!("connecting to {url}")))?
        .map_err(Error::WebSocket)?;

    let (command_tx, command_rx) = mpsc::channel(channel_capacity);
    let connected = Arc::new(AtomicBool::new(true));
    let next_id = Arc::new(AtomicU64::new(1));

    let task = TransportTask {
        ws_stream,
        command_rx,
        pending: HashMap::new(),
        subscribers: HashMap::new(),
        connected: connected.clone(),
    };
    tokio::spawn(task.run());

    Ok(TransportHandle {
        command_tx,
        connected,
        next_id,
    })
}

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct TransportTask {
    ws_stream: WsStream,
    command_rx: mpsc::Receiver<TransportCommand>,
    pending: HashMap<u64, PendingRequest>,
    subscribers: HashMap<(String, Option<String>), Vec<mpsc::Sender<CdpEvent>>>,
    connected: Arc<AtomicBool>,
}

impl TransportTask {
    async fn run(mut self) {
        loop {
            let sleep = tokio::time::sleep(self.earliest_deadline().unwrap_or(Duration::from_secs(1)));
            tokio::select! {
                ws_msg = self.ws_stream.next() => {
                    match ws_msg {
                        Some(Ok(WsMessage::Text(text))) => self.handle_text_message(&text),
                        Some(Ok(WsMessage::Close(_))) | None => {
                            self.handle_disconnect();
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "cdp websocket read error");
                            self.handle_disconnect();
                            break;
                        }
                    }
                }
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(TransportCommand::SendCommand { command, response_tx, deadline }) => {
                            self.handle_send_command(command, response_tx, deadline).await;
                        }
                        Some(TransportCommand::Subscribe { method, session_id, event_tx }) => {
                            self.subscribers.entry((method, session_id)).or_default().push(event_tx);
                        }
                        Some(TransportCommand::Shutdown) | None => {
                            let _ = self.ws_stream.close(None).await;
                            break;
                        }
                    }
                }
                () = sleep => {
                    self.sweep_timeouts();
                }
            }
        }
        self.drain_pending();
    }

    fn handle_text_message(&mut self, text: &str) {
        let raw: RawCdpMessage = match serde_json::from_str(text) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "discarding unparseable cdp message");
                return;
            }
        };
        match raw.classify() {
            Some(MessageKind::Response(resp)) => {
                if let Some(pending) = self.pending.remove(&resp.id) {
                    let result = resp.result.map_err(|e| Error::RequestFailed(e.message));
                    let _ = pending.response_tx.send(result);
                }
            }
            Some(MessageKind::Event(event)) => self.dispatch_event(event),
            None => {}
        }
    }

    fn dispatch_event(&mut self, event: CdpEvent) {
        let key = (event.method.clone(), event.session_id.clone());
        if let Some(subs) = self.subscribers.get_mut(&key) {
            subs.retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
        }
        if event.session_id.is_some() {
            let global_key = (event.method.clone(), None);
            if let Some(subs) = self.subscribers.get_mut(&global_key) {
                subs.retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
            }
        }
    }

    async fn handle_send_command(
        &mut self,
        command: CdpCommand,
        response_tx: oneshot::Sender<Result<serde_json::Value>>,
        deadline: Instant,
    ) {
        let id = command.id;
        let method = command.method.clone();
        let text = match serde_json::to_string(&command) {
            Ok(t) => t,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };
        if let Err(e) = self.ws_stream.send(WsMessage::Text(text.into())).await {
            let _ = response_tx.send(Err(Error::WebSocket(e)));
            return;
        }
        self.pending.insert(
            id,
            PendingRequest {
                response_tx,
                method,
                deadline,
            },
        );
    }

    fn earliest_deadline(&self) -> Option<Duration> {
        self.pending
            .values()
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
            .min()
    }

    fn sweep_timeouts(&mut self) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(p) = self.pending.remove(&id) {
                let _ = p
                    .response_tx
                    .send(Err(Error::RequestTimeout(p.method)));
            }
        }
    }

    fn drain_pending(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        for (_, p) in self.pending.drain() {
            let _ = p
                .response_tx
                .send(Err(Error::TransportClosed("connection closed".into())));
        }
    }

    fn handle_disconnect(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_config_defaults_are_bounded() {
        let c = ReconnectConfig::default();
        assert!(c.max_retries > 0);
        assert!(c.initial_backoff < c.max_backoff);
    }
}
