// src/connection/session.rs

//! Defines the playback state associated with a single client session.

use crate::core::{MediaError, MediaSource, PlaybackCursor};

/// Where a session is in its playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Connected, nothing requested yet.
    #[default]
    Idle,
    /// Payload is being written to the client.
    Streaming,
    /// Halted by `STOP`; `PLAY` resumes from the cursor.
    Stopped,
    /// The end of the source was reached and the write side was shut down.
    Finished,
}

/// Holds the state specific to a single client session.
#[derive(Debug, Default)]
pub struct SessionState {
    pub state: PlaybackState,
    /// This session's own read position in the shared source.
    pub cursor: PlaybackCursor,
    /// The number of commands received on this session.
    pub commands_received: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_streaming(&self) -> bool {
        self.state == PlaybackState::Streaming
    }

    /// Handles `PLAY`. Returns `Ok(true)` if streaming (re)started and
    /// `Ok(false)` if the session was already streaming.
    pub fn play(&mut self) -> Result<bool, MediaError> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Stopped => {
                self.state = PlaybackState::Streaming;
                Ok(true)
            }
            PlaybackState::Streaming => Ok(false),
            PlaybackState::Finished => Err(MediaError::SessionFinished),
        }
    }

    /// Handles `SEEK`. On failure the previous state and cursor are kept.
    pub fn seek(&mut self, offset: u64, source: &dyn MediaSource) -> Result<(), MediaError> {
        if self.state == PlaybackState::Finished {
            return Err(MediaError::SessionFinished);
        }
        self.cursor.seek(offset, source)?;
        self.state = PlaybackState::Streaming;
        Ok(())
    }

    /// Handles `STOP`. Returns true if a running stream was halted.
    pub fn stop(&mut self) -> bool {
        if self.state == PlaybackState::Streaming {
            self.state = PlaybackState::Stopped;
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self) {
        self.state = PlaybackState::Finished;
    }
}
