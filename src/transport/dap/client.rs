//! Low-level DAP client: owns the child process and the framed transport,
//! allocates `seq`, maintains the pending-request table and event
//! subscribers, and implements the single `fail_transport` close path
//! (spec §4.2). Verb-specific behavior (breakpoint grouping, phase machine,
//! pause-waiter discipline) lives one layer up in `executor::dap`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::time::Duration;

use crate::error::{Error, Result};

use super::transport::DapTransport;
use super::types::{Event, Message, Request, Response};

const STDERR_TAIL_CAP: usize = 2048;
const MANUAL_CLOSE_GRACE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Exit,
    Close,
    ProtocolError,
    ManualClose,
}

#[derive(Debug, Clone)]
pub struct CloseInfo {
    pub reason: CloseReason,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
    pub stderr_tail: String,
}

struct Pending {
    tx: oneshot::Sender<Result<Value>>,
}

pub struct DapClient {
    write_tx: mpsc::UnboundedSender<Message>,
    seq_counter: AtomicI64,
    pending: Arc<Mutex<HashMap<i64, Pending>>>,
    event_subs: Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>>,
    close_subs: Arc<RwLock<Vec<mpsc::UnboundedSender<CloseInfo>>>>,
    stderr_tail: Arc<Mutex<VecDeque<u8>>>,
    failed: Arc<AtomicBool>,
    child_pid: Option<i32>,
    child: Arc<Mutex<Option<Child>>>,
}

impl DapClient {
    /// Spawn `program` with `args` and take ownership of its stdio.
    pub async fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let pid = child.id().map(|p| p as i32);

        let transport = DapTransport::new(stdin, stdout);
        Ok(Self::new_with_transport(transport, Some(stderr), Some(child), pid))
    }

    fn new_with_transport(
        transport: DapTransport,
        stderr: Option<tokio::process::ChildStderr>,
        child: Option<Child>,
        child_pid: Option<i32>,
    ) -> Self {
        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<Mutex<HashMap<i64, Pending>>> = Arc::new(Mutex::new(HashMap::new()));
        let event_subs: Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let close_subs: Arc<RwLock<Vec<mpsc::UnboundedSender<CloseInfo>>>> =
            Arc::new(RwLock::new(Vec::new()));
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_CAP)));
        let failed = Arc::new(AtomicBool::new(false));

        let transport = Arc::new(Mutex::new(transport));

        // writer task
        {
            let transport = transport.clone();
            tokio::spawn(async move {
                while let Some(msg) = write_rx.recv().await {
                    let mut t = transport.lock().await;
                    if let Err(e) = t.write_message(&msg).await {
                        tracing::debug!(error = %e, "dap write failed");
                        break;
                    }
                }
            });
        }

        // reader task
        {
            let transport = transport.clone();
            let pending = pending.clone();
            let event_subs = event_subs.clone();
            let close_subs = close_subs.clone();
            let stderr_tail = stderr_tail.clone();
            let failed = failed.clone();
            tokio::spawn(async move {
                loop {
                    let msg = {
                        let mut t = transport.lock().await;
                        t.read_message().await
                    };
                    match msg {
                        Ok(Message::Response(resp)) => {
                            dispatch_response(&pending, resp).await;
                        }
                        Ok(Message::Event(ev)) => {
                            dispatch_event(&event_subs, ev).await;
                        }
                        Ok(Message::Request(_)) => {
                            // adapters do not send us requests in this protocol direction
                        }
                        Err(e) => {
                            let tail = {
                                let t = stderr_tail.lock().await;
                                String::from_utf8_lossy(&t.iter().copied().collect::<Vec<u8>>())
                                    .into_owned()
                            };
                            fail_all(&pending, &close_subs, &failed, CloseInfo {
                                reason: CloseReason::ProtocolError,
                                error: Some(e.to_string()),
                                exit_code: None,
                                signal: None,
                                stderr_tail: tail,
                            })
                            .await;
                            break;
                        }
                    }
                }
            });
        }

        // stderr tail task
        if let Some(mut stderr) = stderr {
            let stderr_tail = stderr_tail.clone();
            tokio::spawn(async move {
                use tokio::io::AsyncReadExt;
                let mut buf = [0u8; 512];
                loop {
                    match stderr.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut tail = stderr_tail.lock().await;
                            for &b in &buf[..n] {
                                if tail.len() >= STDERR_TAIL_CAP {
                                    tail.pop_front();
                                }
                                tail.push_back(b);
                            }
                        }
                    }
                }
            });
        }

        Self {
            write_tx,
            seq_counter: AtomicI64::new(1),
            pending,
            event_subs,
            close_subs,
            stderr_tail,
            failed,
            child_pid,
            child: Arc::new(Mutex::new(child)),
        }
    }

    fn next_seq(&self) -> i64 {
        self.seq_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request and await its response, racing an optional timeout.
    pub async fn send_request(
        &self,
        command: &str,
        arguments: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if self.failed.load(Ordering::Relaxed) {
            return Err(Error::SessionTerminated(command.to_string()));
        }
        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(seq, Pending { tx });

        let req = Message::Request(Request {
            seq,
            command: command.to_string(),
            arguments,
        });
        if self.write_tx.send(req).is_err() {
            self.pending.lock().await.remove(&seq);
            return Err(Error::TransportClosed("dap writer task exited".into()));
        }

        let recv = async {
            rx.await
                .map_err(|_| Error::TransportClosed("dap transport closed before responding".into()))?
        };

        match timeout {
            Some(d) => match tokio::time::timeout(d, recv).await {
                Ok(result) => result,
                Err(_) => {
                    self.pending.lock().await.remove(&seq);
                    Err(Error::RequestTimeout(command.to_string()))
                }
            },
            None => recv.await,
        }
    }

    /// Subscribe to a named DAP event; events fan out in registration order.
    pub async fn on_event(&self, event_name: &str) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_subs
            .write()
            .await
            .entry(event_name.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn on_close(&self) -> mpsc::UnboundedReceiver<CloseInfo> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.close_subs.write().await.push(tx);
        rx
    }

    /// The single idempotent close path (spec §4.2). Safe to call more than once.
    pub async fn fail_transport(
        &self,
        reason: CloseReason,
        error: Option<String>,
        exit_code: Option<i32>,
        signal: Option<String>,
    ) {
        if self.failed.swap(true, Ordering::SeqCst) {
            return; // idempotent: second call is a no-op
        }

        if reason == CloseReason::ManualClose {
            if let Some(pid) = self.child_pid {
                let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
                let child = self.child.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(MANUAL_CLOSE_GRACE).await;
                    let mut guard = child.lock().await;
                    if let Some(c) = guard.as_mut() {
                        if let Ok(None) = c.try_wait() {
                            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
                        }
                    }
                });
            }
        }

        let tail = {
            let t = self.stderr_tail.lock().await;
            String::from_utf8_lossy(&t.iter().copied().collect::<Vec<u8>>()).into_owned()
        };

        fail_all(
            &self.pending,
            &self.close_subs,
            &self.failed,
            CloseInfo {
                reason,
                error,
                exit_code,
                signal,
                stderr_tail: tail,
            },
        )
        .await;
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

async fn dispatch_response(pending: &Arc<Mutex<HashMap<i64, Pending>>>, resp: Response) {
    let entry = pending.lock().await.remove(&resp.request_seq);
    if let Some(p) = entry {
        let result = if resp.success {
            Ok(resp.body.unwrap_or(Value::Object(Default::default())))
        } else {
            Err(Error::RequestFailed(
                resp.message.unwrap_or_else(|| "request failed".to_string()),
            ))
        };
        let _ = p.tx.send(result);
    }
}

async fn dispatch_event(
    subs: &Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>>,
    ev: Event,
) {
    let subs = subs.read().await;
    if let Some(list) = subs.get(&ev.event) {
        for tx in list {
            let _ = tx.send(ev.clone());
        }
    }
}

async fn fail_all(
    pending: &Arc<Mutex<HashMap<i64, Pending>>>,
    close_subs: &Arc<RwLock<Vec<mpsc::UnboundedSender<CloseInfo>>>>,
    failed: &Arc<AtomicBool>,
    info: CloseInfo,
) {
    failed.store(true, Ordering::SeqCst);
    let mut map = pending.lock().await;
    for (_, p) in map.drain() {
        let message = info
            .error
            .clone()
            .unwrap_or_else(|| format!("transport closed: {:?}", info.reason));
        let message = if info.stderr_tail.is_empty() {
            message
        } else {
            format!("{message} (stderr: {})", info.stderr_tail)
        };
        let _ = p.tx.send(Err(Error::TransportClosed(message)));
    }
    drop(map);
    let subs = close_subs.read().await;
    for tx in subs.iter() {
        let _ = tx.send(info.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fail_transport_is_idempotent() {
        let failed = Arc::new(AtomicBool::new(false));
        let pending: Arc<Mutex<HashMap<i64, Pending>>> = Arc::new(Mutex::new(HashMap::new()));
        let close_subs: Arc<RwLock<Vec<mpsc::UnboundedSender<CloseInfo>>>> =
            Arc::new(RwLock::new(Vec::new()));

        assert!(!failed.swap(true, Ordering::SeqCst));
        // a second swap observes `true` already set -> no-op branch taken
        assert!(failed.swap(true, Ordering::SeqCst));

        let _ = fail_all(
            &pending,
            &close_subs,
            &failed,
            CloseInfo {
                reason: CloseReason::Close,
                error: None,
                exit_code: None,
                signal: None,
                stderr_tail: String::new(),
            },
        )
        .await;
    }

    #[tokio::test]
    async fn fail_all_rejects_every_pending_request() {
        let pending: Arc<Mutex<HashMap<i64, Pending>>> = Arc::new(Mutex::new(HashMap::new()));
        let close_subs: Arc<RwLock<Vec<mpsc::UnboundedSender<CloseInfo>>>> =
            Arc::new(RwLock::new(Vec::new()));
        let failed = Arc::new(AtomicBool::new(false));

        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        pending.lock().await.insert(1, Pending { tx: tx1 });
        pending.lock().await.insert(2, Pending { tx: tx2 });

        fail_all(
            &pending,
            &close_subs,
            &failed,
            CloseInfo {
                reason: CloseReason::Exit,
                error: Some("child exited".into()),
                exit_code: Some(1),
                signal: None,
                stderr_tail: String::new(),
            },
        )
        .await;

        assert!(pending.lock().await.is_empty());
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
    }
}
