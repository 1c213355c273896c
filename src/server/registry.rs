// src/server/registry.rs

//! The set of open client connections and their registrations with the
//! poller.

use crate::connection::Connection;
use crate::core::{CommandCodec, MediaError, StatsState};
use mio::net::TcpListener;
use mio::{Interest, Registry, Token};
use std::collections::HashMap;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token of the listening socket.
pub const LISTENER: Token = Token(0);
/// Token of the shutdown waker.
pub const WAKER: Token = Token(1);
/// The first token handed out to client connections.
const FIRST_CLIENT: usize = 2;

/// How many `read` calls one readable event may make before the connection
/// has to wait for the next round.
pub const READS_PER_EVENT: usize = 16;

/// The result of servicing a readable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The socket was drained; bytes were appended to the inbound buffer.
    Data(usize),
    /// The read budget ran out before the socket reported `WouldBlock`.
    /// Readiness will not be reported again, so the caller must come back.
    Budget(usize),
    /// The peer shut down its write side. Bytes received before the FIN are
    /// in the inbound buffer; the connection is still registered.
    PeerClosed(usize),
    /// No connection holds this token (it was closed earlier in the round).
    NotRegistered,
}

/// What one call to `accept_pending` achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptSummary {
    pub accepted: usize,
    /// The listener may still hold connections, but accepting failed for a
    /// reason that is not specific to one connection (e.g. out of file
    /// descriptors). The listener has to be revisited without a new event.
    pub retry: bool,
}

/// The result of one accept attempt.
#[derive(Debug)]
pub enum AcceptOutcome {
    Registered(Token),
    /// No more pending connections.
    Drained,
}

/// Owns the listener and every live connection, keyed by poll token.
pub struct ConnectionRegistry {
    registry: Registry,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    max_clients: usize,
    max_line_length: usize,
    read_buf: Vec<u8>,
    stats: Arc<StatsState>,
}

impl ConnectionRegistry {
    /// Binds `addr` and registers the listener for incoming connections.
    /// Fails if the address is already in use.
    pub fn register_listener(
        registry: Registry,
        addr: SocketAddr,
        stats: Arc<StatsState>,
        max_clients: usize,
        max_line_length: usize,
        read_buffer_size: usize,
    ) -> Result<Self, MediaError> {
        let mut listener = TcpListener::bind(addr)?;
        registry.register(&mut listener, LISTENER, Interest::READABLE)?;
        Ok(Self {
            registry,
            listener,
            connections: HashMap::new(),
            next_token: FIRST_CLIENT,
            max_clients,
            max_line_length,
            read_buf: vec![0; read_buffer_size],
            stats,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, MediaError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.connections.get_mut(&token)
    }

    /// Accepts exactly one pending connection and registers it for readable
    /// events. The new connection starts `Idle`.
    pub fn accept_one(&mut self) -> Result<AcceptOutcome, MediaError> {
        let (mut stream, addr) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(AcceptOutcome::Drained),
            Err(e) => return Err(e.into()),
        };

        if self.connections.len() >= self.max_clients {
            // Dropping the stream closes it.
            warn!("Rejecting connection from {}: client limit reached", addr);
            return Err(MediaError::MaxClientsReached(self.max_clients));
        }

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        let token = self.allocate_token();
        self.registry
            .register(&mut stream, token, Interest::READABLE)?;
        let conn = Connection::new(
            stream,
            addr,
            token,
            CommandCodec::new(self.max_line_length),
            self.stats.clone(),
        );
        self.connections.insert(token, conn);
        info!("Client connected: {} ({:?})", addr, token);
        Ok(AcceptOutcome::Registered(token))
    }

    /// Accepts until the listener has nothing pending. Errors that concern a
    /// single connection are skipped; anything else stops the round and asks
    /// for a retry.
    pub fn accept_pending(&mut self) -> AcceptSummary {
        let mut summary = AcceptSummary::default();
        loop {
            match self.accept_one() {
                Ok(AcceptOutcome::Registered(_)) => summary.accepted += 1,
                Ok(AcceptOutcome::Drained) => break,
                Err(MediaError::MaxClientsReached(_)) => continue,
                Err(MediaError::Io(e)) if is_per_connection_error(&e) => {
                    debug!("Skipping connection that failed during accept: {}", e);
                }
                Err(e) => {
                    warn!("Failed to accept connection, will retry: {}", e);
                    summary.retry = true;
                    break;
                }
            }
        }
        summary
    }

    /// Reads what the socket has to offer into the inbound buffer, making at
    /// most `READS_PER_EVENT` calls so one busy peer cannot hold the loop.
    pub fn on_readable(&mut self, token: Token) -> Result<ReadOutcome, MediaError> {
        let Some(conn) = self.connections.get_mut(&token) else {
            return Ok(ReadOutcome::NotRegistered);
        };
        if conn.read_closed {
            return Ok(ReadOutcome::PeerClosed(0));
        }

        let mut received = 0;
        let mut reads = 0;
        while reads < READS_PER_EVENT {
            match conn.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    debug!("Connection {:?} closed by peer after {} bytes", token, received);
                    conn.read_closed = true;
                    return Ok(ReadOutcome::PeerClosed(received));
                }
                Ok(n) => {
                    conn.inbound.extend_from_slice(&self.read_buf[..n]);
                    received += n;
                    reads += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadOutcome::Data(received));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(ReadOutcome::Budget(received))
    }

    /// Updates the registered interest if it differs from the current one.
    pub fn set_interest(&mut self, token: Token, interest: Interest) -> Result<(), MediaError> {
        let Some(conn) = self.connections.get_mut(&token) else {
            return Ok(());
        };
        if conn.interest != interest {
            self.registry.reregister(&mut conn.stream, token, interest)?;
            conn.interest = interest;
        }
        Ok(())
    }

    /// Deregisters and removes a connection. Dropping the returned value
    /// closes the socket.
    pub fn remove(&mut self, token: Token) -> Option<Connection> {
        let mut conn = self.connections.remove(&token)?;
        if let Err(e) = self.registry.deregister(&mut conn.stream) {
            debug!("Failed to deregister {:?}: {}", token, e);
        }
        Some(conn)
    }

    /// Closes every connection, used on shutdown.
    pub fn close_all(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            drop(self.remove(token));
        }
    }

    pub fn contains(&self, token: Token) -> bool {
        self.connections.contains_key(&token)
    }

    fn allocate_token(&mut self) -> Token {
        loop {
            let candidate = Token(self.next_token);
            self.next_token = self.next_token.wrapping_add(1).max(FIRST_CLIENT);
            if !self.connections.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// Accept failures that concern only the connection being accepted. The
/// listener itself is fine and the backlog can be drained further.
pub fn is_per_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::AlreadyExists
    )
}
