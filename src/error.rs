use thiserror::Error;

/// Crate-wide error type. Every variant maps to a stable `error_code()` string
/// that the daemon socket reports verbatim in its `errorCode` response field.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sqlite connection error: {0}")]
    SqliteConnection(#[from] tokio_rusqlite::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // --- transport taxonomy (spec 4.1/4.2/7) ---
    #[error("transport closed: {0}")]
    TransportClosed(String),

    #[error("process exited{}{}",
        .code.map(|c| format!(" (code {c})")).unwrap_or_default(),
        .signal.as_ref().map(|s| format!(" (signal {s})")).unwrap_or_default())]
    ProcessExited {
        code: Option<i32>,
        signal: Option<String>,
    },

    #[error("request timed out: {0}")]
    RequestTimeout(String),

    #[error("invalid Content-Length header: {0}")]
    ProtocolHeaderInvalid(String),

    #[error("invalid JSON payload: {0}")]
    ProtocolJsonInvalid(String),

    #[error("invalid protocol message: {0}")]
    ProtocolMessageInvalid(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    // --- executor/session taxonomy ---
    #[error("not connected")]
    NotConnected,

    #[error("session terminated: {0}")]
    SessionTerminated(String),

    #[error("no active thread")]
    NoActiveThread,

    #[error("unknown script: {0}")]
    UnknownScript(String),

    #[error("timed out waiting for pause")]
    WaitForPauseTimeout,

    #[error("stop processing failed: {0}")]
    StopProcessingFailed(String),

    #[error("attach failed: {0}")]
    AttachFailed(String),

    #[error("invalid pid: {0}")]
    InvalidPid(String),

    #[error("invalid gdb-remote port: {0}")]
    InvalidGdbRemotePort(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session name already in use: {0}")]
    SessionNameTaken(String),

    #[error("ambiguous session: more than one session registered and none selected")]
    AmbiguousSession,

    #[error("invalid state: {0}")]
    InvalidState(String),

    // --- provider (attach resolution) taxonomy ---
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("app not installed: {0}")]
    AppNotInstalled(String),

    #[error("process not running: {0}")]
    ProcessNotRunning(String),

    #[error("attach denied or timed out: {0}")]
    AttachDeniedOrTimeout(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    // --- query taxonomy ---
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("missing required filter: {0}")]
    MissingRequiredFilter(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("query parse error: {0}")]
    QueryParseError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable string code surfaced in the daemon socket's `errorCode` field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::TransportClosed(_) => "TRANSPORT_CLOSED",
            Error::ProcessExited { .. } => "PROCESS_EXITED",
            Error::RequestTimeout(_) => "REQUEST_TIMEOUT",
            Error::ProtocolHeaderInvalid(_) => "PROTOCOL_HEADER_INVALID",
            Error::ProtocolJsonInvalid(_) => "PROTOCOL_JSON_INVALID",
            Error::ProtocolMessageInvalid(_) => "PROTOCOL_MESSAGE_INVALID",
            Error::RequestFailed(_) => "REQUEST_FAILED",
            Error::NotConnected => "NOT_CONNECTED",
            Error::SessionTerminated(_) => "SESSION_TERMINATED",
            Error::NoActiveThread => "NO_ACTIVE_THREAD",
            Error::UnknownScript(_) => "UNKNOWN_SCRIPT",
            Error::WaitForPauseTimeout => "WAIT_FOR_PAUSE_TIMEOUT",
            Error::StopProcessingFailed(_) => "STOP_PROCESSING_FAILED",
            Error::AttachFailed(_) => "ATTACH_FAILED",
            Error::InvalidPid(_) => "INVALID_PID",
            Error::InvalidGdbRemotePort(_) => "INVALID_GDB_REMOTE_PORT",
            Error::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Error::SessionNameTaken(_) => "SESSION_NAME_TAKEN",
            Error::AmbiguousSession => "AMBIGUOUS_SESSION",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::InvalidRequest(_) => "invalid_request",
            Error::DeviceNotFound(_) => "device_not_found",
            Error::AppNotInstalled(_) => "app_not_installed",
            Error::ProcessNotRunning(_) => "process_not_running",
            Error::AttachDeniedOrTimeout(_) => "attach_denied_or_timeout",
            Error::ProviderError(_) => "provider_error",
            Error::UnknownTable(_) => "unknown table",
            Error::MissingRequiredFilter(_) => "missing required filter",
            Error::UnknownColumn(_) => "unknown column",
            Error::QueryParseError(_) => "parse error",
            Error::Io(_)
            | Error::Json(_)
            | Error::Sqlite(_)
            | Error::SqliteConnection(_)
            | Error::WebSocket(_)
            | Error::Internal(_) => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
