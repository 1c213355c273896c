// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

use audiomux::client::ClientSession;
use audiomux::config::Config;
use audiomux::core::{Command, StatsSnapshot, StatsState};
use audiomux::server::{MediaServer, ShutdownHandle};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

/// Upper bound for any single network interaction in a test.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// A minimal config for testing: ephemeral port and a short poll timeout.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        poll_timeout: Duration::from_millis(50),
        ..Config::default()
    }
}

/// Installs a quiet tracing subscriber (ignore error if already initialized).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// A server running on its own thread for the duration of a test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: ShutdownHandle,
    pub stats: Arc<StatsState>,
    handle: Option<JoinHandle<anyhow::Result<StatsSnapshot>>>,
}

impl TestServer {
    /// Starts a server with the default test configuration.
    pub fn start(payload: Bytes) -> Self {
        Self::with_config(test_config(), payload)
    }

    /// Starts a server with a custom configuration, serving `payload`.
    pub fn with_config(config: Config, payload: Bytes) -> Self {
        init_tracing();
        let server =
            MediaServer::with_source(config, Arc::new(payload)).expect("Failed to bind test server");
        Self::spawn(server)
    }

    /// Runs an already bound server on a background thread.
    pub fn spawn(server: MediaServer) -> Self {
        let addr = server.local_addr().expect("Failed to read local address");
        let shutdown = server.shutdown_handle();
        let stats = server.stats();
        let handle = std::thread::spawn(move || server.run());
        Self {
            addr,
            shutdown,
            stats,
            handle: Some(handle),
        }
    }

    /// Waits for the server thread to exit and returns its final counters.
    pub fn join(mut self) -> StatsSnapshot {
        self.handle
            .take()
            .expect("Server already joined")
            .join()
            .expect("Server thread panicked")
            .expect("Server returned an error")
    }

    /// Polls `condition` against the live counters until it holds.
    pub async fn wait_for_stats(&self, condition: impl Fn(&StatsSnapshot) -> bool) -> StatsSnapshot {
        let deadline = tokio::time::Instant::now() + IO_TIMEOUT;
        loop {
            let snapshot = self.stats.snapshot();
            if condition(&snapshot) {
                return snapshot;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for stats, last snapshot: {snapshot:?}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.shutdown.trigger();
            let _ = handle.join();
        }
    }
}

/// Fails the test if `fut` does not complete within `IO_TIMEOUT`.
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(IO_TIMEOUT, fut)
        .await
        .expect("Test timed out")
}

/// Sends one command through a `ClientSession` and collects the whole stream.
pub async fn fetch(addr: SocketAddr, command: Command) -> Vec<u8> {
    with_timeout(async {
        let session = ClientSession::connect(addr)
            .await
            .expect("Failed to connect");
        let mut received = Vec::new();
        session
            .run(command, &mut |chunk: &[u8]| received.extend_from_slice(chunk))
            .await
            .expect("Session failed");
        received
    })
    .await
}

/// Opens a raw connection for tests that need byte-level control.
pub async fn connect_raw(addr: SocketAddr) -> TcpStream {
    with_timeout(TcpStream::connect(addr))
        .await
        .expect("Failed to connect")
}

/// Writes raw protocol bytes.
pub async fn send_raw(stream: &mut TcpStream, bytes: &[u8]) {
    with_timeout(stream.write_all(bytes))
        .await
        .expect("Failed to write");
}

/// Reads until the server ends the stream.
pub async fn read_to_end(stream: &mut TcpStream) -> Vec<u8> {
    let mut received = Vec::new();
    with_timeout(stream.read_to_end(&mut received))
        .await
        .expect("Failed to read");
    received
}

/// Asserts that nothing arrives on `stream` within `wait`.
pub async fn assert_silent(stream: &mut TcpStream, wait: Duration) {
    let mut buf = [0u8; 64];
    match tokio::time::timeout(wait, stream.read(&mut buf)).await {
        Err(_) => {}
        Ok(Ok(n)) => panic!("Expected silence, received {n} bytes"),
        Ok(Err(e)) => panic!("Expected silence, read failed: {e}"),
    }
}
