//! Round-trips a real DAP session against the fake adapter fixture
//! (`tests/bin/fake_dap_adapter.rs`, built as the `fake_dap_adapter` test
//! binary) over the actual Content-Length-framed stdio transport.

use std::path::PathBuf;
use std::time::Duration;

use dbgd::transport::dap::DapClient;
use serde_json::json;

/// The fixture is declared as a `[[test]] harness = false` binary rather
/// than a shipped `[[bin]]`, so it has no `CARGO_BIN_EXE_*` variable; find it
/// next to this test binary in the deps directory instead.
fn fake_adapter_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps_dir = exe.parent()?;
    std::fs::read_dir(deps_dir).ok()?.filter_map(|e| e.ok()).map(|e| e.path()).find(|p| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.starts_with("fake_dap_adapter") && !s.ends_with(".d"))
            .unwrap_or(false)
    })
}

#[tokio::test]
async fn initialize_launch_and_continue_round_trip() {
    let Some(adapter) = fake_adapter_path() else {
        eprintln!("skipping: fake_dap_adapter binary not found next to test binary");
        return;
    };

    let client = DapClient::spawn(adapter.to_str().unwrap(), &[]).await.expect("spawn fake adapter");

    let mut initialized_events = client.on_event("initialized").await;
    let caps = client
        .send_request("initialize", Some(json!({"adapterID": "fake"})), Some(Duration::from_secs(5)))
        .await
        .expect("initialize");
    assert_eq!(caps["supportsConditionalBreakpoints"], true);

    tokio::time::timeout(Duration::from_secs(5), initialized_events.recv())
        .await
        .expect("initialized event within timeout")
        .expect("initialized event channel open");

    client
        .send_request("launch", Some(json!({"program": "fizzbuzz.py"})), Some(Duration::from_secs(5)))
        .await
        .expect("launch");

    let bp_response = client
        .send_request(
            "setBreakpoints",
            Some(json!({"source": {"path": "/test/test.py"}, "breakpoints": [{"line": 10}]})),
            Some(Duration::from_secs(5)),
        )
        .await
        .expect("setBreakpoints");
    let breakpoints = bp_response["breakpoints"].as_array().expect("breakpoints array");
    assert_eq!(breakpoints.len(), 1);
    assert_eq!(breakpoints[0]["line"], 10);

    client
        .send_request("configurationDone", None, Some(Duration::from_secs(5)))
        .await
        .expect("configurationDone");

    let mut stopped_events = client.on_event("stopped").await;
    let continue_response = client
        .send_request("continue", Some(json!({"threadId": 1})), Some(Duration::from_secs(5)))
        .await
        .expect("continue");
    assert_eq!(continue_response["allThreadsContinued"], true);

    let stopped = tokio::time::timeout(Duration::from_secs(5), stopped_events.recv())
        .await
        .expect("stopped event within timeout")
        .expect("stopped event channel open");
    assert_eq!(stopped.body.expect("stopped event body")["reason"], "breakpoint");

    let stack = client
        .send_request("stackTrace", Some(json!({"threadId": 1})), Some(Duration::from_secs(5)))
        .await
        .expect("stackTrace");
    assert_eq!(stack["totalFrames"], 2);

    let evaluated = client
        .send_request("evaluate", Some(json!({"expression": "x"})), Some(Duration::from_secs(5)))
        .await
        .expect("evaluate");
    assert_eq!(evaluated["result"], "42");

    client
        .send_request("disconnect", None, Some(Duration::from_secs(5)))
        .await
        .expect("disconnect");
}
