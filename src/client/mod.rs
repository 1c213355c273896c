// src/client/mod.rs

//! The client side of the protocol: connect, send a command, and hand every
//! received chunk to a `Renderer` until the server ends the stream.

mod renderer;

pub use renderer::{Renderer, WriterRenderer};

use crate::core::{Command, CommandCodec, MediaError};
use futures::SinkExt;
use std::net::SocketAddr;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::FramedWrite;
use tracing::debug;

/// The default read size, matching the server's default chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// One client connection to an audiomux server.
pub struct ClientSession {
    reader: OwnedReadHalf,
    writer: FramedWrite<OwnedWriteHalf, CommandCodec>,
    peer: SocketAddr,
    buffer: Vec<u8>,
}

impl ClientSession {
    /// Opens a connection to `addr`.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, MediaError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        debug!("Connected to {}", peer);
        Ok(Self {
            reader,
            writer: FramedWrite::new(writer, CommandCodec::default()),
            peer,
            buffer: vec![0; DEFAULT_CHUNK_SIZE],
        })
    }

    /// Sets the size of the buffer used for each read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.buffer = vec![0; chunk_size.max(1)];
        self
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Writes one command line to the server.
    pub async fn send(&mut self, command: Command) -> Result<(), MediaError> {
        debug!("Sending {} to {}", command, self.peer);
        self.writer.send(command).await
    }

    /// Reads until end-of-stream, rendering every chunk. Returns the number
    /// of bytes received. I/O failures, including ones raised by the
    /// renderer, end the session with an error.
    pub async fn receive<R>(&mut self, renderer: &mut R) -> Result<u64, MediaError>
    where
        R: Renderer + ?Sized,
    {
        let mut total = 0u64;
        loop {
            let n = self.reader.read(&mut self.buffer).await?;
            if n == 0 {
                break;
            }
            renderer.render(&self.buffer[..n])?;
            total += n as u64;
        }
        renderer.finish()?;
        debug!("Stream from {} ended after {} bytes", self.peer, total);
        Ok(total)
    }

    /// Sends exactly one command and renders the response stream.
    pub async fn run<R>(mut self, command: Command, renderer: &mut R) -> Result<u64, MediaError>
    where
        R: Renderer + ?Sized,
    {
        self.send(command).await?;
        self.receive(renderer).await
    }
}
