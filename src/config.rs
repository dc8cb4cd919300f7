//! Environment-variable driven configuration. No file format: every knob is
//! an env var with a sane default, read once at daemon startup.

use std::path::PathBuf;

const DEFAULT_SOCKET_PATH: &str = "/tmp/dbg.sock";
const DEFAULT_EVENT_STORE_PATH: &str = "/tmp/dbg-events.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    /// Command socket path (spec §6). `DBG_SOCKET_PATH`.
    pub socket_path: PathBuf,
    /// Event store database path. `DBG_EVENT_STORE_PATH`.
    pub event_store_path: PathBuf,
    /// External host-tooling binary used to resolve Apple-device attach
    /// requests and discover debug-proxy ports. `DBG_HOST_TOOLING_PATH`.
    pub host_tooling_path: String,
    /// External DAP adapter binary used for `lldb`-backed attach sessions.
    /// `DBG_DAP_ADAPTER_PATH`.
    pub dap_adapter_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            socket_path: std::env::var("DBG_SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET_PATH)),
            event_store_path: std::env::var("DBG_EVENT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_EVENT_STORE_PATH)),
            host_tooling_path: std::env::var("DBG_HOST_TOOLING_PATH").unwrap_or_else(|_| "host-tooling".to_string()),
            dap_adapter_path: std::env::var("DBG_DAP_ADAPTER_PATH").unwrap_or_else(|_| "lldb-dap".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        std::env::remove_var("DBG_SOCKET_PATH");
        std::env::remove_var("DBG_EVENT_STORE_PATH");
        let cfg = Config::from_env();
        assert_eq!(cfg.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert_eq!(cfg.event_store_path, PathBuf::from(DEFAULT_EVENT_STORE_PATH));
    }
}
