//! End-to-end tests against the command socket: bind a real daemon context
//! on a temp socket/event-store and exercise it with raw newline-delimited
//! JSON requests, the same way a CLI client would.

use std::sync::Arc;

use dbgd::config::Config;
use dbgd::daemon::context::DaemonContext;
use dbgd::daemon::listener::Listener;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

async fn spawn_daemon(tmp: &tempfile::TempDir) -> std::path::PathBuf {
    let socket_path = tmp.path().join("dbg.sock");
    let config = Config {
        socket_path: socket_path.clone(),
        event_store_path: tmp.path().join("events.sqlite3"),
        host_tooling_path: "host-tooling".to_string(),
        dap_adapter_path: "lldb-dap".to_string(),
    };
    let ctx = Arc::new(DaemonContext::new(config).await.expect("context"));
    let listener = Listener::bind(ctx).expect("bind");
    tokio::spawn(listener.run());

    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    socket_path
}

async fn roundtrip(socket_path: &std::path::Path, cmd: &str, args: Option<&str>, s: Option<&str>) -> Value {
    let stream = UnixStream::connect(socket_path).await.expect("connect");
    let (reader, mut writer) = stream.into_split();
    let request = json!({"cmd": cmd, "args": args, "s": s});
    let mut payload = serde_json::to_vec(&request).unwrap();
    payload.push(b'\n');
    writer.write_all(&payload).await.unwrap();

    let mut lines = BufReader::new(reader).lines();
    let line = lines.next_line().await.unwrap().expect("response line");
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn ss_on_a_fresh_daemon_lists_no_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = spawn_daemon(&tmp).await;

    let response = roundtrip(&socket_path, "ss", None, None).await;
    assert_eq!(response["ok"], true);
    assert_eq!(response["sessions"], json!([]));
    assert_eq!(response["current"], Value::Null);
}

#[tokio::test]
async fn unknown_command_reports_invalid_request() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = spawn_daemon(&tmp).await;

    let response = roundtrip(&socket_path, "bogus", None, None).await;
    assert_eq!(response["ok"], false);
    assert_eq!(response["errorCode"], "invalid_request");
}

#[tokio::test]
async fn status_without_any_session_reports_ambiguous_session() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = spawn_daemon(&tmp).await;

    let response = roundtrip(&socket_path, "status", None, None).await;
    assert_eq!(response["ok"], false);
    assert_eq!(response["errorCode"], "AMBIGUOUS_SESSION");
}

#[tokio::test]
async fn malformed_json_line_gets_invalid_json_response() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = spawn_daemon(&tmp).await;

    let stream = UnixStream::connect(&socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer.write_all(b"not json at all\n").await.unwrap();

    let mut lines = BufReader::new(reader).lines();
    let line = lines.next_line().await.unwrap().expect("response line");
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"], "invalid JSON");
}

#[tokio::test]
async fn use_rejects_an_unregistered_session_name() {
    let tmp = tempfile::tempdir().unwrap();
    let socket_path = spawn_daemon(&tmp).await;

    let response = roundtrip(&socket_path, "use", Some("nope"), None).await;
    assert_eq!(response["ok"], false);
    assert_eq!(response["errorCode"], "SESSION_NOT_FOUND");
}
