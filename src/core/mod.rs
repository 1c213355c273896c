// src/core/mod.rs

//! The central module containing the protocol, the byte sources and the
//! shared bookkeeping of the server.

pub mod errors;
pub mod protocol;
pub mod source;
pub mod stats;

pub use errors::MediaError;
pub use protocol::{Command, CommandCodec};
pub use source::{FileSource, MediaSource, PlaybackCursor};
pub use stats::{StatsSnapshot, StatsState};
