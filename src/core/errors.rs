// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::num::ParseIntError;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server
/// and the client session.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Invalid seek offset: {0}")]
    InvalidOffset(String),

    #[error("Seek offset {offset} is beyond the end of the source ({len} bytes)")]
    SeekOutOfRange { offset: u64, len: u64 },

    #[error("Command line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("Stream already finished for this session")]
    SessionFinished,

    #[error("Connection limit of {0} clients reached")]
    MaxClientsReached(usize),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for MediaError {
    fn clone(&self) -> Self {
        match self {
            MediaError::Io(e) => MediaError::Io(Arc::clone(e)),
            MediaError::UnknownCommand(s) => MediaError::UnknownCommand(s.clone()),
            MediaError::InvalidOffset(s) => MediaError::InvalidOffset(s.clone()),
            MediaError::SeekOutOfRange { offset, len } => MediaError::SeekOutOfRange {
                offset: *offset,
                len: *len,
            },
            MediaError::LineTooLong(max) => MediaError::LineTooLong(*max),
            MediaError::SessionFinished => MediaError::SessionFinished,
            MediaError::MaxClientsReached(max) => MediaError::MaxClientsReached(*max),
            MediaError::Internal(s) => MediaError::Internal(s.clone()),
        }
    }
}

impl PartialEq for MediaError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MediaError::Io(e1), MediaError::Io(e2)) => {
                e1.kind() == e2.kind() && e1.to_string() == e2.to_string()
            }
            (MediaError::UnknownCommand(s1), MediaError::UnknownCommand(s2)) => s1 == s2,
            (MediaError::InvalidOffset(s1), MediaError::InvalidOffset(s2)) => s1 == s2,
            (
                MediaError::SeekOutOfRange {
                    offset: o1,
                    len: l1,
                },
                MediaError::SeekOutOfRange {
                    offset: o2,
                    len: l2,
                },
            ) => o1 == o2 && l1 == l2,
            (MediaError::LineTooLong(m1), MediaError::LineTooLong(m2)) => m1 == m2,
            (MediaError::MaxClientsReached(m1), MediaError::MaxClientsReached(m2)) => m1 == m2,
            (MediaError::Internal(s1), MediaError::Internal(s2)) => s1 == s2,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl MediaError {
    /// Returns true for transport errors that simply mean the peer went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, MediaError::Io(arc_err) if matches!(
            arc_err.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
        ))
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for MediaError {
    fn from(e: std::io::Error) -> Self {
        MediaError::Io(Arc::new(e))
    }
}

impl From<ParseIntError> for MediaError {
    fn from(e: ParseIntError) -> Self {
        MediaError::InvalidOffset(e.to_string())
    }
}
