//! Accept loop for the command socket: one spawned task per connection,
//! newline-delimited JSON request/response framing, shared `DaemonContext`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::error::Result;

use super::context::DaemonContext;
use super::dispatch::dispatch;
use super::protocol::{Request, Response};

pub struct Listener {
    socket: UnixListener,
    ctx: Arc<DaemonContext>,
}

impl Listener {
    pub fn bind(ctx: Arc<DaemonContext>) -> Result<Self> {
        let path = &ctx.config.socket_path;
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let socket = UnixListener::bind(path)?;
        Ok(Self { socket, ctx })
    }

    /// Accepts connections until a shutdown signal fires, then runs cleanup
    /// (close sessions, close the event store, unlink the socket) once.
    pub async fn run(self) {
        let ctx = self.ctx;
        loop {
            tokio::select! {
                accepted = self.socket.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &ctx).await {
                                    debug!(error = %e, "connection handling ended with error");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept error"),
                    }
                }
                _ = wait_for_shutdown_signal() => {
                    warn!("shutdown signal received, cleaning up");
                    ctx.shutdown().await;
                    break;
                }
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle_connection(stream: UnixStream, ctx: &DaemonContext) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(ctx, request).await,
            Err(_) => Response::invalid_json(),
        };
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
    }
    Ok(())
}
