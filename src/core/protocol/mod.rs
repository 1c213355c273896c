// src/core/protocol/mod.rs

pub mod codec;
pub mod command;
pub use codec::{CommandCodec, DEFAULT_MAX_LINE_LENGTH};
pub use command::Command;
