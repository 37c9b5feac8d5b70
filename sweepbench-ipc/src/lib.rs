#![warn(missing_docs)]
//! Sweepbench Worker Protocol
//!
//! Newline-delimited JSON between the controller and the worker process:
//! requests flow down the worker's stdin, events flow back up its stdout,
//! one JSON value per line. The worker's stderr is not framed; the
//! controller forwards raw stderr lines itself.

mod codec;
mod messages;

pub use codec::{LineReader, LineWriter, ProtocolError};
pub use messages::{RunRequest, WorkerEvent, WorkerRequest};

/// Maximum accepted line length (16 MB) to bound memory against a
/// misbehaving peer.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;
