// src/server/context.rs

use super::registry::ConnectionRegistry;
use super::shutdown::ShutdownHandle;
use crate::config::Config;
use crate::core::{MediaSource, StatsState};
use mio::Poll;
use std::sync::Arc;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub config: Config,
    pub poll: Poll,
    pub registry: ConnectionRegistry,
    pub source: Arc<dyn MediaSource>,
    pub stats: Arc<StatsState>,
    pub shutdown: ShutdownHandle,
}
