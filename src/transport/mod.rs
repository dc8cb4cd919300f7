//! Framed transport layer (C1): CDP over WebSocket, DAP over child stdio.

pub mod cdp;
pub mod dap;
