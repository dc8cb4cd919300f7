pub mod client;
pub mod transport;
pub mod types;

pub use client::{CloseInfo, CloseReason, DapClient};
pub use transport::DapTransport;
