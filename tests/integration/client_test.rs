// tests/integration/client_test.rs

//! `ClientSession` against a live server: renderers, multiple commands on one
//! session, and failure reporting.

use super::fixtures::*;
use super::test_helpers::*;
use audiomux::client::{Renderer, WriterRenderer};
use audiomux::core::{Command, MediaError};
use audiomux::ClientSession;
use std::io;

/// Fails on the first chunk it is given.
struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&mut self, _chunk: &[u8]) -> io::Result<()> {
        Err(io::Error::other("speaker unplugged"))
    }
}

#[tokio::test]
async fn test_writer_renderer_collects_stream() {
    let payload = small_payload();
    let server = TestServer::start(payload.clone());

    let session = ClientSession::connect(server.addr).await.unwrap();
    assert_eq!(session.peer_addr(), server.addr);

    let mut renderer = WriterRenderer::new(Vec::new());
    let total = with_timeout(session.run(Command::Seek(10), &mut renderer))
        .await
        .unwrap();
    assert_eq!(total, 90);
    assert_eq!(renderer.into_inner(), payload[10..]);
}

#[tokio::test]
async fn test_small_client_buffer_receives_everything() {
    let payload = patterned_payload(30_000);
    let server = TestServer::start(payload.clone());

    let session = ClientSession::connect(server.addr)
        .await
        .unwrap()
        .with_chunk_size(3);
    let mut chunks = 0usize;
    let mut received = Vec::new();
    let total = with_timeout(session.run(Command::Play, &mut |chunk: &[u8]| {
        assert!(chunk.len() <= 3);
        chunks += 1;
        received.extend_from_slice(chunk);
    }))
    .await
    .unwrap();

    assert_eq!(total, payload.len() as u64);
    assert!(chunks >= 10_000);
    assert_eq!(received, payload.as_ref());
}

#[tokio::test]
async fn test_several_commands_on_one_session() {
    let payload = small_payload();
    let server = TestServer::start(payload.clone());

    let mut session = ClientSession::connect(server.addr).await.unwrap();
    session.send(Command::Seek(500)).await.unwrap();
    session.send(Command::Unknown("NOPE".into())).await.unwrap();
    session.send(Command::Seek(75)).await.unwrap();

    let mut renderer = WriterRenderer::new(Vec::new());
    with_timeout(session.receive(&mut renderer)).await.unwrap();
    assert_eq!(renderer.into_inner(), payload[75..]);

    let stats = server.wait_for_stats(|s| s.total_commands >= 3).await;
    assert_eq!(stats.unknown_commands, 1);
}

#[tokio::test]
async fn test_renderer_error_ends_session() {
    let server = TestServer::start(large_payload());

    let session = ClientSession::connect(server.addr).await.unwrap();
    let err = with_timeout(session.run(Command::Play, &mut FailingRenderer))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Io(_)));
    assert!(err.to_string().contains("speaker unplugged"));

    // The server drops the abandoned connection and keeps serving.
    server.wait_for_stats(|s| s.connected_clients == 0).await;
    assert_eq!(fetch(server.addr, Command::Seek(4_000_000)).await.len(), 194_304);
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = ClientSession::connect(addr).await.err().unwrap();
    assert!(matches!(err, MediaError::Io(_)));
}
