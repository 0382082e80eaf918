//! Integration tests for graceful shutdown of `noema serve`.
//! Closing stdin (EOF) must exit cleanly, persist processed percepts and
//! stop any background flow.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn noema_binary() -> std::path::PathBuf {
    assert_cmd::cargo::cargo_bin!("noema").into()
}

fn spawn_serve(data_dir: &TempDir) -> std::process::Child {
    let mut config = std::fs::File::create(data_dir.path().join("config.toml")).unwrap();
    writeln!(config, "[flow]\ninterval_ms = 10").unwrap();

    Command::new(noema_binary())
        .arg("serve")
        .env("NOEMA_DATA_DIR", data_dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn noema serve")
}

/// Send the MCP initialize handshake so the server enters its main loop.
fn mcp_handshake(child: &mut std::process::Child) {
    let stdin = child.stdin.as_mut().expect("stdin pipe");

    let init_req = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test", "version": "0.1.0" }
        }
    });
    send_jsonrpc(stdin, &init_req);
    std::thread::sleep(Duration::from_millis(300));

    let initialized = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    });
    send_jsonrpc(stdin, &initialized);
    std::thread::sleep(Duration::from_millis(200));
}

/// Newline-delimited JSON, the rmcp stdio framing.
fn send_jsonrpc(stdin: &mut impl Write, msg: &serde_json::Value) {
    let line = serde_json::to_string(msg).unwrap();
    writeln!(stdin, "{line}").unwrap();
    stdin.flush().unwrap();
}

fn call_tool(child: &mut std::process::Child, id: u64, name: &str, arguments: serde_json::Value) {
    let stdin = child.stdin.as_mut().expect("stdin pipe");
    let req = serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    });
    send_jsonrpc(stdin, &req);
}

#[test]
fn serve_exits_on_stdin_eof() {
    let dir = TempDir::new().unwrap();
    let mut child = spawn_serve(&dir);
    mcp_handshake(&mut child);

    drop(child.stdin.take());

    let start = Instant::now();
    let output = child.wait_with_output().expect("wait");
    let elapsed = start.elapsed();

    assert!(
        output.status.success(),
        "noema serve should exit 0 on stdin EOF, got {}",
        output.status
    );
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn processed_percept_is_persisted_on_exit() {
    let dir = TempDir::new().unwrap();
    let mut child = spawn_serve(&dir);
    mcp_handshake(&mut child);

    call_tool(
        &mut child,
        2,
        "noema_process",
        serde_json::json!({ "content": "hello", "session_id": "served" }),
    );
    std::thread::sleep(Duration::from_millis(500));

    drop(child.stdin.take());
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("deterministicKey"), "tool response missing: {stdout}");

    let raw = std::fs::read_to_string(dir.path().join("consciousness.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["version"], "1.0");
    assert_eq!(doc["states"][0]["sessionId"], "served");
}

#[test]
fn running_flow_stops_on_exit() {
    let dir = TempDir::new().unwrap();
    let mut child = spawn_serve(&dir);
    mcp_handshake(&mut child);

    call_tool(
        &mut child,
        2,
        "noema_start_flow",
        serde_json::json!({ "session_id": "background" }),
    );
    std::thread::sleep(Duration::from_millis(500));

    drop(child.stdin.take());
    let start = Instant::now();
    let output = child.wait_with_output().expect("wait");
    let elapsed = start.elapsed();

    assert!(output.status.success(), "exit status {}", output.status);
    assert!(elapsed < Duration::from_secs(2), "flow kept the process alive for {elapsed:?}");

    let raw = std::fs::read_to_string(dir.path().join("consciousness.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["states"][0]["sessionId"], "background");
    assert!(doc["states"][0]["version"].as_u64().unwrap() >= 2);
}
