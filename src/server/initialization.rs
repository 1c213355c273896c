// src/server/initialization.rs

//! Handles server initialization: opening the media source, creating the
//! poller and binding the listener. Any failure here is fatal and happens
//! before the event loop starts.

use super::context::ServerContext;
use super::registry::{ConnectionRegistry, WAKER};
use super::shutdown::ShutdownHandle;
use crate::config::Config;
use crate::core::{FileSource, MediaSource, StatsState};
use anyhow::{Context, Result};
use mio::{Poll, Waker};
use std::sync::Arc;
use tracing::{info, warn};

/// Opens the configured file and initializes all server components.
pub fn setup(config: Config) -> Result<ServerContext> {
    let source = FileSource::open(&config.file_path)
        .with_context(|| format!("Failed to open media file '{}'", config.file_path))?;
    info!(
        "Serving '{}' ({} bytes).",
        source.path().display(),
        source.len()
    );
    setup_with_source(config, Arc::new(source))
}

/// Initializes all server components around an already opened source.
pub fn setup_with_source(config: Config, source: Arc<dyn MediaSource>) -> Result<ServerContext> {
    log_startup_info(&config, source.as_ref());

    let poll = Poll::new().context("Failed to create the poll instance")?;
    let waker = Waker::new(poll.registry(), WAKER).context("Failed to create the poll waker")?;
    let shutdown = ShutdownHandle::new(waker);
    let stats = Arc::new(StatsState::new());

    let addr = config.listen_addr()?;
    let registry = ConnectionRegistry::register_listener(
        poll.registry()
            .try_clone()
            .context("Failed to clone the poll registry")?,
        addr,
        stats.clone(),
        config.max_clients,
        config.max_line_length,
        config.chunk_size,
    )
    .with_context(|| format!("Failed to bind listener on {addr}"))?;
    info!("audiomux server listening on {}", registry.local_addr()?);

    Ok(ServerContext {
        config,
        poll,
        registry,
        source,
        stats,
        shutdown,
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config, source: &dyn MediaSource) {
    info!(
        "Chunk size {} bytes, up to {} chunks per session per tick, poll timeout {:?}.",
        config.chunk_size, config.max_chunks_per_tick, config.poll_timeout
    );
    info!("Accepting up to {} concurrent clients.", config.max_clients);
    if source.is_empty() {
        warn!("The media source is empty. Every stream will end immediately.");
    }
}
