// src/lib.rs

pub mod client;
pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export
pub use crate::client::ClientSession;
pub use crate::server::MediaServer;
