//! The daemon front-end (spec §4.5/§6): a long-lived process that owns every
//! session, the event store, and the query table registry behind a single
//! Unix command socket.

pub mod args;
pub mod context;
pub mod dispatch;
pub mod listener;
pub mod protocol;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::Result;

pub use context::DaemonContext;

/// Builds the daemon context and runs the accept loop until a shutdown
/// signal arrives. Entry point for `main.rs`.
pub async fn run(config: Config) -> Result<()> {
    info!(socket = %config.socket_path.display(), "starting daemon");
    let ctx = Arc::new(DaemonContext::new(config).await?);
    let listener = listener::Listener::bind(ctx)?;
    listener.run().await;
    Ok(())
}
