use std::{collections::VecDeque, ops::Range};

use thiserror::Error;

/// Errors raised when a caller asks for bytes the window does not hold
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("bytes {start}..{end} have been discarded (window starts at {window_start})")]
    Discarded {
        start: usize,
        end: usize,
        window_start: usize,
    },

    #[error("bytes {start}..{end} have not been read yet (window ends at {window_end})")]
    NotBuffered {
        start: usize,
        end: usize,
        window_end: usize,
    },
}

/// A dynamically resizable buffer that acts like a window being moved over a
/// larger byte stream. Positions are always absolute to that stream, so the
/// caller can address bytes by parser offsets without tracking the window's
/// own movement.
#[derive(Default)]
pub struct Window {
    pos: usize,
    buf: VecDeque<u8>,
}

impl Window {
    /// Append data to the window (i.e. make it larger)
    pub fn extend(&mut self, buf: &[u8]) {
        self.buf.extend(buf);
    }

    /// The absolute position of the first byte still buffered
    pub fn start(&self) -> usize {
        self.pos
    }

    /// The absolute position just past the last byte buffered
    pub fn end(&self) -> usize {
        self.pos + self.buf.len()
    }

    /// Return a chunk of the window. The range is given in absolute stream
    /// positions. An empty range always succeeds.
    pub fn get_bytes(&self, range: Range<usize>) -> Result<Vec<u8>, WindowError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        if range.start < self.pos {
            return Err(WindowError::Discarded {
                start: range.start,
                end: range.end,
                window_start: self.pos,
            });
        }

        if range.end > self.end() {
            return Err(WindowError::NotBuffered {
                start: range.start,
                end: range.end,
                window_end: self.end(),
            });
        }

        let start = range.start - self.pos;
        let len = range.end - range.start;
        Ok(self.buf.iter().skip(start).take(len).copied().collect())
    }

    /// Move the window's start to the given absolute position, dropping all
    /// earlier bytes. The window's end is not moved.
    pub fn advance_to(&mut self, pos: usize) -> Result<(), WindowError> {
        if pos < self.pos {
            return Err(WindowError::Discarded {
                start: pos,
                end: pos,
                window_start: self.pos,
            });
        }

        if pos > self.end() {
            return Err(WindowError::NotBuffered {
                start: pos,
                end: pos,
                window_end: self.end(),
            });
        }

        self.buf.drain(0..pos - self.pos);
        self.pos = pos;

        Ok(())
    }
}
