//! Worker process entry point
//!
//! Requests arrive on stdin, events leave on stdout, one JSON value per
//! line. A pump thread owns stdin so the sweep loop can poll for a `Stop`
//! request between measurements without blocking; stdin closing is treated
//! the same as `Stop`. Diagnostics go to stderr, which the controller
//! forwards line by line.

use crate::runner::Measurer;
use crate::{TaskDef, find_task, registered_tasks};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use sweepbench_ipc::{LineReader, LineWriter, ProtocolError, RunRequest, WorkerEvent, WorkerRequest};

/// The worker main loop.
pub struct WorkerMain {
    requests: Receiver<WorkerRequest>,
    writer: LineWriter<io::Stdout>,
}

impl WorkerMain {
    /// Creates a worker speaking the line protocol on stdin/stdout.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = LineReader::new(io::stdin().lock());
            loop {
                match reader.read::<WorkerRequest>() {
                    Ok(request) => {
                        if tx.send(request).is_err() {
                            break;
                        }
                    }
                    Err(ProtocolError::EndOfStream) => break,
                    Err(e) => {
                        eprintln!("sweepbench-worker: bad request: {e}");
                        break;
                    }
                }
            }
        });
        Self {
            requests: rx,
            writer: LineWriter::new(io::stdout()),
        }
    }

    /// Serves the initial request, then returns. `List` answers and exits;
    /// `Run` streams measurement events until stopped.
    pub fn run(&mut self) -> Result<(), ProtocolError> {
        match self.requests.recv() {
            Ok(WorkerRequest::List) => {
                let tasks = registered_tasks()
                    .iter()
                    .map(|t| t.name.to_string())
                    .collect();
                self.writer.write(&WorkerEvent::TaskList { tasks })
            }
            Ok(WorkerRequest::Run(request)) => self.run_sweep(request),
            Ok(WorkerRequest::Stop) | Err(_) => Ok(()),
        }
    }

    fn run_sweep(&mut self, request: RunRequest) -> Result<(), ProtocolError> {
        let tasks: Vec<&'static TaskDef> = request
            .tasks
            .iter()
            .filter_map(|name| {
                let task = find_task(name);
                if task.is_none() {
                    eprintln!("sweepbench-worker: unknown task {name:?}, skipping");
                }
                task
            })
            .collect();
        if tasks.is_empty() || request.sizes.is_empty() {
            return Ok(());
        }

        let mut measurer = Measurer::new();
        // Size-major order: every task is measured at size S before any task
        // is measured at the next size, so cross-task results at a common
        // size arrive together. The sweep wraps until stopped.
        'sweep: for pass in 0u64.. {
            if request.randomize_inputs && pass > 0 {
                measurer.discard_instances();
            }
            for &size in &request.sizes {
                for task in &tasks {
                    if self.stop_requested() {
                        break 'sweep;
                    }
                    self.writer.write(&WorkerEvent::WillMeasure {
                        task: task.name.to_string(),
                        size,
                    })?;
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        measurer.measure(
                            task,
                            size,
                            request.iterations,
                            request.min_duration,
                            request.max_duration,
                        )
                    }));
                    match outcome {
                        Ok(Some(elapsed)) => {
                            self.writer.write(&WorkerEvent::DidMeasure {
                                task: task.name.to_string(),
                                size,
                                elapsed,
                            })?;
                        }
                        // A declined size is a gap; keep sweeping.
                        Ok(None) => {}
                        Err(payload) => {
                            self.writer.write(&WorkerEvent::Failed {
                                message: format!(
                                    "task {:?} panicked at size {}: {}",
                                    task.name,
                                    size,
                                    panic_message(&payload)
                                ),
                            })?;
                            break 'sweep;
                        }
                    }
                }
            }
        }
        io::stdout().flush()?;
        Ok(())
    }

    /// Drains pending requests; `Stop` or a closed stdin ends the sweep.
    fn stop_requested(&self) -> bool {
        loop {
            match self.requests.try_recv() {
                Ok(WorkerRequest::Stop) => return true,
                Ok(other) => {
                    eprintln!("sweepbench-worker: ignoring {other:?} during a run");
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
