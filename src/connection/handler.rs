// src/connection/handler.rs

//! Defines the `ConnectionHandler`, which decodes the commands a connection
//! sent, drives its playback session, and streams payload to it.

use super::Connection;
use crate::config::Config;
use crate::core::{Command, MediaError, MediaSource, StatsState};
use bytes::Buf;
use std::io::{self, Write};
use std::net::Shutdown;
use std::sync::Arc;
use tokio_util::codec::Decoder;
use tracing::{debug, info, warn};

/// What the event loop should do after a connection's commands were handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Continue,
    /// A `CLOSE` command asked for the server to shut down.
    Shutdown,
}

/// The result of one streaming step for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProgress {
    /// The session is not streaming; nothing to do.
    Idle,
    /// The socket stopped accepting bytes; resume on the next writable event.
    Blocked,
    /// The per-tick chunk budget ran out while the socket was still writable.
    Yielded,
    /// The end of the source was reached and the write side was shut down.
    Finished,
}

/// Executes commands and streams payload for connections of one server.
///
/// A single handler serves every connection; it owns the scratch buffer that
/// chunks are read into.
pub struct ConnectionHandler {
    source: Arc<dyn MediaSource>,
    stats: Arc<StatsState>,
    chunk: Vec<u8>,
    max_chunks_per_tick: usize,
}

impl ConnectionHandler {
    pub fn new(source: Arc<dyn MediaSource>, stats: Arc<StatsState>, config: &Config) -> Self {
        Self {
            source,
            stats,
            chunk: vec![0; config.chunk_size],
            max_chunks_per_tick: config.max_chunks_per_tick,
        }
    }

    /// Decodes and executes every complete command buffered for `conn`.
    /// Partial commands stay buffered until the rest arrives.
    pub fn process_inbound(&mut self, conn: &mut Connection) -> NextAction {
        self.drain_commands(conn, false)
    }

    /// Like `process_inbound`, for a peer that will send nothing more: an
    /// unterminated last line is executed instead of waiting for its newline.
    pub fn process_final(&mut self, conn: &mut Connection) -> NextAction {
        if !conn.inbound.is_empty() {
            debug!(
                "Peer {} closed with {} undecoded byte(s) buffered",
                conn.addr,
                conn.inbound.len()
            );
        }
        self.drain_commands(conn, true)
    }

    fn drain_commands(&mut self, conn: &mut Connection, at_eof: bool) -> NextAction {
        loop {
            let decoded = if at_eof {
                conn.codec.decode_eof(&mut conn.inbound)
            } else {
                conn.codec.decode(&mut conn.inbound)
            };
            match decoded {
                Ok(Some(command)) => {
                    if self.dispatch(conn, command) == NextAction::Shutdown {
                        return NextAction::Shutdown;
                    }
                }
                Ok(None) => return NextAction::Continue,
                Err(e) => warn!("Protocol error from {}: {}", conn.addr, e),
            }
        }
    }

    /// Applies one command to the connection's session.
    pub fn dispatch(&mut self, conn: &mut Connection, command: Command) -> NextAction {
        self.stats.increment_total_commands();
        conn.session.commands_received += 1;
        info!("Received from client {}: {}", conn.addr, command);

        match command {
            Command::Play => match conn.session.play() {
                Ok(true) => debug!(
                    "Session {:?}: streaming from offset {}",
                    conn.token,
                    conn.session.cursor.position()
                ),
                Ok(false) => debug!("Session {:?}: PLAY while already streaming", conn.token),
                Err(e) => warn!("Ignoring PLAY from {}: {}", conn.addr, e),
            },
            Command::Stop => {
                // Bytes already read stay buffered so a later PLAY resumes
                // without a gap.
                if conn.session.stop() {
                    info!(
                        "Playback stopped for {} at offset {}",
                        conn.addr,
                        conn.session.cursor.position() - conn.outbound.len() as u64
                    );
                } else {
                    debug!("Session {:?}: STOP with no active stream", conn.token);
                }
            }
            Command::Seek(offset) => match conn.session.seek(offset, self.source.as_ref()) {
                Ok(()) => {
                    conn.outbound.clear();
                    debug!("Session {:?}: seeked to offset {}", conn.token, offset);
                }
                Err(e) => warn!("SEEK from {} failed: {}", conn.addr, e),
            },
            Command::Close => {
                info!("Server is closing (CLOSE from {})", conn.addr);
                return NextAction::Shutdown;
            }
            Command::Unknown(text) => {
                self.stats.increment_unknown_commands();
                warn!("Unknown command from {}: '{}'", conn.addr, text);
            }
        }
        NextAction::Continue
    }

    /// Writes chunks to `conn` until the socket would block, the session
    /// stops streaming, the source is exhausted, or the per-tick budget is
    /// spent.
    pub fn pump(&mut self, conn: &mut Connection) -> Result<StreamProgress, MediaError> {
        let mut chunks_read = 0;
        while conn.session.is_streaming() {
            if conn.outbound.is_empty() {
                if chunks_read == self.max_chunks_per_tick {
                    return Ok(StreamProgress::Yielded);
                }
                let n = conn
                    .session
                    .cursor
                    .read_chunk(self.source.as_ref(), &mut self.chunk)?;
                if n == 0 {
                    return self.finish(conn);
                }
                conn.outbound.extend_from_slice(&self.chunk[..n]);
                chunks_read += 1;
            }

            match conn.stream.write(&conn.outbound) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => {
                    conn.outbound.advance(n);
                    self.stats.add_bytes_streamed(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(StreamProgress::Blocked);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(StreamProgress::Idle)
    }

    /// Marks the end of the stream by shutting down the write side, which the
    /// client observes as end-of-stream.
    fn finish(&mut self, conn: &mut Connection) -> Result<StreamProgress, MediaError> {
        conn.session.finish();
        conn.stream.shutdown(Shutdown::Write)?;
        info!(
            "Finished streaming to {} ({} bytes total in source)",
            conn.addr,
            self.source.len()
        );
        Ok(StreamProgress::Finished)
    }
}
