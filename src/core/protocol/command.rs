// src/core/protocol/command.rs

//! The commands understood by the server and the rules for classifying a
//! command line.

use crate::core::MediaError;
use std::fmt;

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream from the session's current position to the end of the source.
    Play,
    /// Halt streaming for this session.
    Stop,
    /// Move to an absolute byte offset, then stream.
    Seek(u64),
    /// Shut the server down.
    Close,
    /// Anything else, carrying the offending text.
    Unknown(String),
}

impl Command {
    /// The protocol name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play => "PLAY",
            Command::Stop => "STOP",
            Command::Seek(_) => "SEEK",
            Command::Close => "CLOSE",
            Command::Unknown(_) => "UNKNOWN",
        }
    }

    /// True for the commands that cause the server to send payload back.
    pub fn streams(&self) -> bool {
        matches!(self, Command::Play | Command::Seek(_))
    }

    /// Interprets one fully-buffered chunk: the first line is the command and,
    /// for `SEEK`, the second line is the offset. Bytes after that are ignored.
    ///
    /// Callers using this must guarantee that the whole command arrived in one
    /// read. The server itself frames commands with `CommandCodec` instead.
    pub fn parse_chunk(chunk: &[u8]) -> Command {
        let (first, rest) = split_line(chunk);
        let first = first.trim_ascii();
        if first == b"SEEK" {
            let (offset, _) = split_line(rest);
            return Command::seek_from_arg(offset.trim_ascii());
        }
        Command::from_line(first)
    }

    /// Builds a command from a user-supplied name and optional argument, as
    /// given on a command line.
    pub fn from_parts(name: &str, arg: Option<&str>) -> Result<Command, MediaError> {
        match name.to_ascii_uppercase().as_str() {
            "PLAY" => Ok(Command::Play),
            "STOP" => Ok(Command::Stop),
            "CLOSE" => Ok(Command::Close),
            "SEEK" => {
                let arg = arg.ok_or_else(|| {
                    MediaError::InvalidOffset("SEEK requires an offset".to_string())
                })?;
                Ok(Command::Seek(arg.trim().parse::<u64>()?))
            }
            _ => Err(MediaError::UnknownCommand(name.to_string())),
        }
    }

    /// Classifies a single trimmed line. `SEEK` is not handled here because
    /// it needs its argument line.
    pub(crate) fn from_line(line: &[u8]) -> Command {
        match line {
            b"PLAY" => Command::Play,
            b"STOP" => Command::Stop,
            b"CLOSE" => Command::Close,
            other => Command::Unknown(String::from_utf8_lossy(other).into_owned()),
        }
    }

    /// Parses the argument line of a `SEEK`. A malformed offset becomes an
    /// `Unknown` command carrying the text.
    pub(crate) fn seek_from_arg(arg: &[u8]) -> Command {
        std::str::from_utf8(arg)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Command::Seek)
            .unwrap_or_else(|| Command::Unknown(String::from_utf8_lossy(arg).into_owned()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Seek(offset) => write!(f, "SEEK {offset}"),
            Command::Unknown(text) => write!(f, "UNKNOWN '{text}'"),
            other => f.write_str(other.name()),
        }
    }
}

/// Splits at the first `\n`, returning the line without its terminator and the
/// remainder. Without a newline the whole input is the line.
fn split_line(bytes: &[u8]) -> (&[u8], &[u8]) {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(i) => (&bytes[..i], &bytes[i + 1..]),
        None => (bytes, &[]),
    }
}
