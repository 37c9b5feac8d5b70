//! Process controller
//!
//! Owns one worker OS process at a time and turns its line-protocol output
//! into `ProcessEvent`s on an mpsc channel. Every event is tagged with the
//! `ProcessHandle` of the process that produced it; receivers validate that
//! tag against the handle they are tracking and drop anything stale, which
//! is what makes a rapid stop/start safe while the old process drains.

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;
use sweepbench_ipc::{LineReader, LineWriter, ProtocolError, WorkerEvent, WorkerRequest};
use sweepbench_stats::Time;
use thiserror::Error;

/// Opaque identity of one spawned worker process.
///
/// Handles are compared by identity only; two handles are equal iff they
/// refer to the same spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle(u64);

impl ProcessHandle {
    /// Mints a handle from a raw identifier. Alternate [`WorkerBackend`]
    /// implementations use this; each spawn must get a fresh identifier.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

/// Which of the worker's output streams a forwarded line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// The worker's standard output (forwarded in-band by the worker).
    Stdout,
    /// The worker's standard error (read raw by the controller).
    Stderr,
}

/// An asynchronous event from one worker process.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// The worker reported the tasks it can execute.
    TaskList(Vec<String>),
    /// The worker is about to measure a (task, size) cell.
    WillMeasure {
        /// Task name.
        task: String,
        /// Input size.
        size: u64,
    },
    /// The worker completed one measurement.
    DidMeasure {
        /// Task name.
        task: String,
        /// Input size.
        size: u64,
        /// Elapsed time per iteration.
        elapsed: Time,
    },
    /// A line of worker output.
    OutputLine {
        /// Originating stream.
        stream: OutputStream,
        /// Line text without the newline.
        text: String,
    },
    /// The process failed: launch-adjacent I/O, a protocol violation, an
    /// in-worker fatal error, or an unclean exit. Settles the process.
    Failed {
        /// Human-readable description.
        message: String,
    },
    /// The process ended its event stream and exited cleanly. Settles the
    /// process.
    Stopped,
}

/// Channel on which a backend delivers `(handle, event)` pairs.
pub type EventSender = Sender<(ProcessHandle, ProcessEvent)>;

/// Errors starting a worker process.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The executable could not be spawned.
    #[error("failed to launch worker {program:?}: {source}")]
    Launch {
        /// The executable that failed to launch.
        program: PathBuf,
        /// The underlying spawn error.
        source: io::Error,
    },

    /// A requested pipe was not available on the spawned child.
    #[error("worker {0} pipe was not captured")]
    Pipe(&'static str),

    /// The initial request could not be written to the worker.
    #[error("failed to send initial request to worker: {0}")]
    Request(#[from] ProtocolError),
}

/// The spawn/signal seam between the scheduler and the operating system.
///
/// The production implementation is [`ProcessController`]; tests drive the
/// scheduler with a scripted backend instead.
pub trait WorkerBackend {
    /// Spawns a worker, sends `request`, and wires its output to `events`.
    /// Fails synchronously if the executable cannot be launched.
    fn start(
        &mut self,
        request: WorkerRequest,
        events: EventSender,
    ) -> Result<ProcessHandle, ControllerError>;

    /// Requests cooperative termination of `handle`. Never blocks, and is
    /// idempotent: repeated calls, or calls after the process settled, have
    /// no additional effect.
    fn signal_stop(&mut self, handle: ProcessHandle);
}

struct LiveWorker {
    handle: ProcessHandle,
    stdin: LineWriter<std::process::ChildStdin>,
    stop_sent: bool,
}

/// Spawns and owns real worker OS processes.
pub struct ProcessController {
    program: PathBuf,
    args: Vec<String>,
    next_id: u64,
    live: Option<LiveWorker>,
}

impl ProcessController {
    /// A controller that launches `program` with `args` for every request.
    pub fn new(program: impl AsRef<Path>, args: Vec<String>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args,
            next_id: 1,
            live: None,
        }
    }

    /// The configured worker executable.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl WorkerBackend for ProcessController {
    fn start(
        &mut self,
        request: WorkerRequest,
        events: EventSender,
    ) -> Result<ProcessHandle, ControllerError> {
        let handle = ProcessHandle(self.next_id);
        self.next_id += 1;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ControllerError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ControllerError::Pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(ControllerError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ControllerError::Pipe("stderr"))?;

        let mut stdin = LineWriter::new(stdin);
        if let Err(e) = stdin.write(&request) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.into());
        }

        // Dropping a superseded LiveWorker closes its stdin, which a
        // well-behaved worker treats as a stop request.
        self.live = Some(LiveWorker {
            handle,
            stdin,
            stop_sent: false,
        });

        let stderr_events = events.clone();
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines() {
                let Ok(text) = line else { break };
                let event = ProcessEvent::OutputLine {
                    stream: OutputStream::Stderr,
                    text,
                };
                if stderr_events.send((handle, event)).is_err() {
                    break;
                }
            }
        });

        thread::spawn(move || pump_events(child, stdout, handle, events));

        Ok(handle)
    }

    fn signal_stop(&mut self, handle: ProcessHandle) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if live.handle != handle || live.stop_sent {
            return;
        }
        live.stop_sent = true;
        if let Err(e) = live.stdin.write(&WorkerRequest::Stop) {
            // The worker likely exited already; its settle event is on the way.
            tracing::warn!("failed to signal worker stop: {e}");
        }
    }
}

/// Reads protocol events off the worker's stdout until the stream ends, then
/// reaps the child and reports how it settled.
fn pump_events(mut child: Child, stdout: ChildStdout, handle: ProcessHandle, events: EventSender) {
    let mut reader = LineReader::new(BufReader::new(stdout));
    loop {
        match reader.read::<WorkerEvent>() {
            Ok(event) => {
                if events.send((handle, translate(event))).is_err() {
                    break;
                }
            }
            Err(ProtocolError::EndOfStream) => break,
            Err(e) => {
                let event = ProcessEvent::Failed {
                    message: format!("worker protocol violation: {e}"),
                };
                let _ = events.send((handle, event));
                // Nobody drains stdout after a violation; a worker that
                // keeps streaming would fill the pipe and never exit, so
                // kill it before reaping.
                let _ = child.kill();
                let _ = child.wait();
                return;
            }
        }
    }

    let status = child.wait();
    let event = match status {
        Ok(status) if status.success() => ProcessEvent::Stopped,
        Ok(status) => ProcessEvent::Failed {
            message: format!("worker exited uncleanly: {status}"),
        },
        Err(e) => ProcessEvent::Failed {
            message: format!("failed to reap worker: {e}"),
        },
    };
    let _ = events.send((handle, event));
}

fn translate(event: WorkerEvent) -> ProcessEvent {
    match event {
        WorkerEvent::TaskList { tasks } => ProcessEvent::TaskList(tasks),
        WorkerEvent::WillMeasure { task, size } => ProcessEvent::WillMeasure { task, size },
        WorkerEvent::DidMeasure {
            task,
            size,
            elapsed,
        } => ProcessEvent::DidMeasure {
            task,
            size,
            elapsed,
        },
        WorkerEvent::Stdout { text } => ProcessEvent::OutputLine {
            stream: OutputStream::Stdout,
            text,
        },
        WorkerEvent::Failed { message } => ProcessEvent::Failed { message },
    }
}
