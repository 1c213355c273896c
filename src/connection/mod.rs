// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: its buffers, its
//! playback session, and the handler that turns commands into streamed bytes.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::{ConnectionHandler, NextAction, StreamProgress};
pub use session::{PlaybackState, SessionState};

use crate::core::{CommandCodec, StatsState};
use bytes::BytesMut;
use mio::net::TcpStream;
use mio::{Interest, Token};
use std::net::SocketAddr;
use std::sync::Arc;

/// One accepted client connection, owned by the connection registry.
#[derive(Debug)]
pub struct Connection {
    pub(crate) stream: TcpStream,
    pub(crate) addr: SocketAddr,
    pub(crate) token: Token,
    /// The interest currently registered with the poller.
    pub(crate) interest: Interest,
    /// Bytes received but not yet decoded into commands.
    pub(crate) inbound: BytesMut,
    /// Bytes read from the source but not yet accepted by the socket.
    pub(crate) outbound: BytesMut,
    pub(crate) codec: CommandCodec,
    pub(crate) session: SessionState,
    /// Set once the peer shut down its write side. The stream may still be
    /// written until the session ends.
    pub(crate) read_closed: bool,
    _guard: ConnectionGuard,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        addr: SocketAddr,
        token: Token,
        codec: CommandCodec,
        stats: Arc<StatsState>,
    ) -> Self {
        Self {
            stream,
            addr,
            token,
            interest: Interest::READABLE,
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            codec,
            session: SessionState::new(),
            read_closed: false,
            _guard: ConnectionGuard::new(stats, addr),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn is_read_closed(&self) -> bool {
        self.read_closed
    }
}
