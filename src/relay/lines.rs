//! Newline-delimited record splitting.
//!
//! Backend bodies arrive as arbitrary byte chunks. [`LineSplitter`]
//! reassembles `\n`-terminated records across chunk boundaries in a
//! growable [`BytesMut`]. There is no fixed line size: by default the
//! buffer grows as long as a record needs. With a configured limit, an
//! oversized record is reported as an error, never truncated. The limit
//! counts record content only; the `\n` and an optional `\r` before it
//! are not included.

// ============================================================================
// Imports
// ============================================================================

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Initial buffer capacity.
const INITIAL_CAPACITY: usize = 8 * 1024;

// ============================================================================
// LineSplitter
// ============================================================================

/// Incremental `\n` splitter.
///
/// - A trailing `\r` is stripped from each line.
/// - Empty lines are skipped.
/// - An unterminated final line is returned by [`LineSplitter::finish`].
#[derive(Debug)]
pub struct LineSplitter {
    buffer: BytesMut,
    /// Bytes of `buffer` already known to contain no `\n`.
    scanned: usize,
    max_line_bytes: Option<usize>,
}

impl LineSplitter {
    /// Creates a splitter. `None` means lines may grow without bound.
    #[must_use]
    pub fn new(max_line_bytes: Option<usize>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            scanned: 0,
            max_line_bytes,
        }
    }

    /// Appends a chunk of body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the next complete line, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendStream`] if a line exceeds the configured
    /// limit.
    pub fn next_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buffer.len();
                self.check_limit(content_len(&self.buffer))?;
                return Ok(None);
            };

            let newline = self.scanned + offset;
            self.check_limit(content_len(&self.buffer[..newline]))?;

            let mut line = self.buffer.split_to(newline + 1);
            self.scanned = 0;
            line.truncate(newline);
            strip_cr(&mut line);

            if !line.is_empty() {
                return Ok(Some(line.freeze()));
            }
        }
    }

    /// Returns the unterminated remainder at end of stream.
    #[must_use]
    pub fn finish(&mut self) -> Option<Bytes> {
        let mut rest = self.buffer.split();
        self.scanned = 0;
        strip_cr(&mut rest);
        (!rest.is_empty()).then(|| rest.freeze())
    }

    /// Returns the number of buffered bytes.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn check_limit(&self, len: usize) -> Result<()> {
        match self.max_line_bytes {
            Some(max) if len > max => Err(Error::backend_stream(format!(
                "backend line exceeds {max} bytes"
            ))),
            _ => Ok(()),
        }
    }
}

/// Length of `line` without a trailing `\r`.
fn content_len(line: &[u8]) -> usize {
    line.strip_suffix(b"\r").map_or(line.len(), <[u8]>::len)
}

fn strip_cr(line: &mut BytesMut) {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
}

// ============================================================================
// Tests
// ============================================================================
