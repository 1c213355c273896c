// src/core/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all counters related to server-wide statistics.
///
/// The event loop is the only writer, but the counters are atomics so that a
/// handle can be read from another thread while the server is running.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted by the server since startup.
    total_connections: AtomicU64,
    /// The number of currently registered connections.
    connected_clients: AtomicU64,
    /// The total number of commands processed by the server since startup.
    total_commands: AtomicU64,
    /// The number of commands that were not recognized.
    unknown_commands: AtomicU64,
    /// The total number of payload bytes written to clients.
    bytes_streamed: AtomicU64,
}

/// A point-in-time copy of the server counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub connected_clients: u64,
    pub total_commands: u64,
    pub unknown_commands: u64,
    pub bytes_streamed: u64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            connected_clients: AtomicU64::new(0),
            total_commands: AtomicU64::new(0),
            unknown_commands: AtomicU64::new(0),
            bytes_streamed: AtomicU64::new(0),
        }
    }

    /// Records a newly accepted connection.
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.connected_clients.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection leaving the registry.
    pub fn connection_closed(&self) {
        self.connected_clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn increment_total_commands(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unknown_commands(&self) {
        self.unknown_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_streamed(&self, n: usize) {
        self.bytes_streamed.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Gets the number of currently connected clients.
    pub fn get_connected_clients(&self) -> u64 {
        self.connected_clients.load(Ordering::Relaxed)
    }

    /// Takes a consistent-enough copy of all counters for reporting.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            connected_clients: self.connected_clients.load(Ordering::Relaxed),
            total_commands: self.total_commands.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
        }
    }
}
