// tests/integration/cli_test.rs

//! Runs the `audiomux --client` binary against a test server.

use super::fixtures::*;
use super::test_helpers::*;
use std::process::{Command as Process, Output};

async fn run_client_binary(args: Vec<String>) -> Output {
    let task = tokio::task::spawn_blocking(move || {
        Process::new(env!("CARGO_BIN_EXE_audiomux"))
            .args(&args)
            .env("RUST_LOG", "debug")
            .output()
            .expect("Failed to run the client binary")
    });
    with_timeout(task).await.expect("Client task panicked")
}

#[tokio::test]
async fn test_client_stdout_carries_only_the_stream() {
    let payload = small_payload();
    let server = TestServer::start(payload.clone());

    let output = run_client_binary(vec![
        "--client".to_string(),
        server.addr.to_string(),
        "PLAY".to_string(),
    ])
    .await;

    assert!(output.status.success(), "client failed: {output:?}");
    assert_eq!(output.stdout, payload.as_ref());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains(&format!("Received {SMALL_PAYLOAD_LEN} bytes")),
        "missing log line in stderr: {stderr}"
    );
}

#[tokio::test]
async fn test_client_seek_writes_tail_to_stdout() {
    let payload = small_payload();
    let server = TestServer::start(payload.clone());

    let output = run_client_binary(vec![
        "--client".to_string(),
        server.addr.to_string(),
        "SEEK".to_string(),
        "40".to_string(),
    ])
    .await;

    assert!(output.status.success(), "client failed: {output:?}");
    assert_eq!(output.stdout, payload[40..]);
}
