// src/server/mod.rs

//! The multiplexed server: one thread, one poller, many connections.

use crate::config::Config;
use crate::core::{MediaSource, StatsSnapshot, StatsState};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

mod connection_loop;
mod context;
mod initialization;
pub mod registry;
mod shutdown;

pub use context::ServerContext;
pub use registry::{AcceptOutcome, AcceptSummary, ConnectionRegistry, ReadOutcome};
pub use shutdown::ShutdownHandle;

/// A bound, ready-to-run server.
///
/// Binding and opening the source happen in the constructors, so a value of
/// this type never enters the loop in a broken state. `run` consumes it and
/// blocks the calling thread.
pub struct MediaServer {
    ctx: ServerContext,
}

impl MediaServer {
    /// Opens `config.file_path` and binds `config.host:config.port`.
    pub fn bind(config: Config) -> Result<Self> {
        Ok(Self {
            ctx: initialization::setup(config)?,
        })
    }

    /// Binds the listener and serves the given source instead of a file.
    pub fn with_source(config: Config, source: Arc<dyn MediaSource>) -> Result<Self> {
        Ok(Self {
            ctx: initialization::setup_with_source(config, source)?,
        })
    }

    /// The address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.ctx.registry.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.ctx.shutdown.clone()
    }

    pub fn stats(&self) -> Arc<StatsState> {
        self.ctx.stats.clone()
    }

    /// Runs the event loop until `CLOSE` or a shutdown request.
    pub fn run(self) -> Result<StatsSnapshot> {
        connection_loop::run(self.ctx)
    }
}

/// The main server startup function: bind, then serve until closed.
pub fn run(config: Config) -> Result<StatsSnapshot> {
    MediaServer::bind(config)?.run()
}
