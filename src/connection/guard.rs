// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection bookkeeping.

use crate::core::StatsState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Keeps the connected-clients counter honest: the count goes up when a
/// connection is accepted and comes down however the connection ends.
#[derive(Debug)]
pub struct ConnectionGuard {
    stats: Arc<StatsState>,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(stats: Arc<StatsState>, addr: SocketAddr) -> Self {
        stats.connection_opened();
        Self { stats, addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.stats.connection_closed();
        info!("Client disconnected: {}", self.addr);
    }
}
