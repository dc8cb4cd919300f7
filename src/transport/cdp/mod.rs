pub mod client;
pub mod discovery;
pub mod transport;
pub mod types;

pub use client::{CdpClient, CdpConfig, CdpSession};
pub use discovery::{discover_targets, enable_domains_best_effort, pick_target, TargetInfo, TargetKind};
pub use types::{CdpCommand, CdpEvent, CdpProtocolError};
