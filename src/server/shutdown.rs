// src/server/shutdown.rs

//! A cross-thread handle for stopping the event loop.

use mio::Waker;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Requests a shutdown of a running server from any thread.
///
/// The loop checks the flag after every wake-up; the waker makes sure a
/// blocked `poll` returns immediately instead of waiting out its timeout.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub(crate) fn new(waker: Waker) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        }
    }

    /// Asks the server to stop. Safe to call more than once.
    pub fn trigger(&self) -> io::Result<()> {
        if !self.requested.swap(true, Ordering::SeqCst) {
            debug!("Shutdown requested.");
        }
        self.waker.wake()
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
