//! Newline-delimited JSON codec
//!
//! One serialized value per line. Blank lines are skipped on read; a line
//! that is not valid JSON for the expected type is a protocol violation,
//! reported with a truncated copy of the offending text.

use crate::MAX_LINE_BYTES;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{BufRead, Read, Write};
use thiserror::Error;

/// How much of a malformed line to echo back in the error.
const ERROR_SNIPPET_LEN: usize = 200;

/// Errors from reading or writing protocol lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line did not parse as the expected message type.
    #[error("malformed protocol line {line:?}: {message}")]
    Malformed {
        /// Truncated copy of the offending line.
        line: String,
        /// The parse error.
        message: String,
    },

    /// A line exceeded [`MAX_LINE_BYTES`].
    #[error("protocol line too long: {size} bytes (max {max})")]
    LineTooLong {
        /// Observed length so far.
        size: usize,
        /// The configured cap.
        max: usize,
    },

    /// The peer closed the stream.
    #[error("end of stream")]
    EndOfStream,
}

/// Reads one message per line from a buffered reader.
pub struct LineReader<R: BufRead> {
    reader: R,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
        }
    }

    /// Reads the next message, skipping blank lines. Returns
    /// [`ProtocolError::EndOfStream`] once the peer closes the stream.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        loop {
            self.buf.clear();
            // Read through a limit so an oversized line fails before it is
            // buffered; a peer streaming without a newline can otherwise
            // grow the buffer without bound.
            let n = (&mut self.reader)
                .take(MAX_LINE_BYTES as u64 + 1)
                .read_line(&mut self.buf)?;
            if n == 0 {
                return Err(ProtocolError::EndOfStream);
            }
            if n > MAX_LINE_BYTES {
                return Err(ProtocolError::LineTooLong {
                    size: n,
                    max: MAX_LINE_BYTES,
                });
            }
            let line = self.buf.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(line).map_err(|e| ProtocolError::Malformed {
                line: snippet(line),
                message: e.to_string(),
            });
        }
    }

    /// Consumes the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes one message per line, flushing after each so the peer never waits
/// on a buffered message.
pub struct LineWriter<W: Write> {
    writer: W,
}

impl<W: Write> LineWriter<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serializes a message and writes it as one line.
    pub fn write<T: Serialize>(&mut self, message: &T) -> Result<(), ProtocolError> {
        let mut line = serde_json::to_string(message).map_err(|e| ProtocolError::Malformed {
            line: String::new(),
            message: e.to_string(),
        })?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consumes the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn snippet(line: &str) -> String {
    if line.len() <= ERROR_SNIPPET_LEN {
        return line.to_string();
    }
    let mut end = ERROR_SNIPPET_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}
