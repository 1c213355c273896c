// src/client/renderer.rs

//! The callback a `ClientSession` hands each received chunk to.

use std::io::{self, Write};

/// Receives the stream chunk by chunk, in arrival order.
///
/// The slice is only valid for the duration of the call; the session reuses
/// its buffer for the next read.
pub trait Renderer {
    fn render(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Called once after the stream ended cleanly.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F> Renderer for F
where
    F: FnMut(&[u8]),
{
    fn render(&mut self, chunk: &[u8]) -> io::Result<()> {
        self(chunk);
        Ok(())
    }
}

/// Writes every chunk to an `io::Write`, e.g. stdout or a file.
#[derive(Debug)]
pub struct WriterRenderer<W: Write> {
    writer: W,
}

impl<W: Write> WriterRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Renderer for WriterRenderer<W> {
    fn render(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
