// src/core/protocol/codec.rs

//! Implements the line framing of the command protocol as a
//! `tokio_util::codec` `Decoder`/`Encoder` pair.
//!
//! The decoder accumulates bytes per connection, so a command split across
//! several reads is still recognized once its last newline arrives.

use super::command::Command;
use crate::core::MediaError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The default limit for a single command or argument line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 256;

const NEWLINE: u8 = b'\n';

/// A codec for newline-terminated commands.
#[derive(Debug, Clone)]
pub struct CommandCodec {
    max_line_length: usize,
    /// Set after an over-long line; input is dropped until the next newline.
    discarding: bool,
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl CommandCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            discarding: false,
        }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Drops the buffered prefix of an over-long line and remembers to skip
    /// the rest of it.
    fn start_discarding(&mut self, src: &mut BytesMut) -> MediaError {
        src.clear();
        self.discarding = true;
        MediaError::LineTooLong(self.max_line_length)
    }
}

fn find_newline(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == NEWLINE)
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = MediaError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.discarding {
            match find_newline(src) {
                Some(i) => {
                    src.advance(i + 1);
                    self.discarding = false;
                }
                None => {
                    src.clear();
                    return Ok(None);
                }
            }
        }

        let Some(first_end) = find_newline(src) else {
            if src.len() > self.max_line_length {
                return Err(self.start_discarding(src));
            }
            return Ok(None);
        };
        if first_end > self.max_line_length {
            src.advance(first_end + 1);
            return Err(MediaError::LineTooLong(self.max_line_length));
        }

        let line = src[..first_end].trim_ascii();
        if line != b"SEEK" {
            let command = Command::from_line(line);
            src.advance(first_end + 1);
            return Ok(Some(command));
        }

        // `SEEK` is only complete once its offset line has arrived.
        let arg_start = first_end + 1;
        let Some(arg_len) = find_newline(&src[arg_start..]) else {
            if src.len() - arg_start > self.max_line_length {
                src.advance(arg_start);
                return Err(self.start_discarding(src));
            }
            return Ok(None);
        };
        if arg_len > self.max_line_length {
            src.advance(arg_start + arg_len + 1);
            return Err(MediaError::LineTooLong(self.max_line_length));
        }

        let command = Command::seek_from_arg(src[arg_start..arg_start + arg_len].trim_ascii());
        src.advance(arg_start + arg_len + 1);
        Ok(Some(command))
    }

    /// At end of input an unterminated last line still counts as a command,
    /// so `CLOSE` without a trailing newline is honored. A bare `SEEK` whose
    /// offset never arrived becomes `Unknown`.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(command) = self.decode(src)? {
            return Ok(Some(command));
        }
        if self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        let rest = src.split();
        if rest.trim_ascii().is_empty() {
            return Ok(None);
        }
        Ok(Some(Command::parse_chunk(&rest)))
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = MediaError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Command::Seek(offset) => {
                dst.put_slice(b"SEEK\n");
                dst.put_slice(offset.to_string().as_bytes());
                dst.put_u8(NEWLINE);
            }
            Command::Unknown(text) => {
                dst.put_slice(text.as_bytes());
                dst.put_u8(NEWLINE);
            }
            other => {
                dst.put_slice(other.name().as_bytes());
                dst.put_u8(NEWLINE);
            }
        }
        Ok(())
    }
}
