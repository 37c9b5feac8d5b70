//! Protocol message types
//!
//! The command/response shape is load-bearing; the framing (JSON lines) is
//! deliberately boring. `Time` values travel as raw picosecond integers so
//! nothing is lost crossing the process boundary.

use serde::{Deserialize, Serialize};
use sweepbench_stats::Time;

/// A request sent from the controller to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Ask for the ordered list of task names the worker can execute.
    /// The worker replies with one `TaskList` event and exits.
    List,
    /// Start a measurement run. The worker streams events until it is told
    /// to stop or its stdin closes.
    Run(RunRequest),
    /// Wind down the current run and end the event stream.
    Stop,
}

/// Everything the worker needs to execute one sweep, snapshotted by the
/// controller when the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Task names to measure, in registry order.
    pub tasks: Vec<String>,
    /// Sorted input sizes; the worker loops size-major and wraps around
    /// indefinitely.
    pub sizes: Vec<u64>,
    /// Repetitions of the task body inside one measurement.
    pub iterations: u64,
    /// Keep re-measuring (doubling the batch) until at least this much time
    /// is spent in one measurement.
    pub min_duration: Time,
    /// Hard cap on the time spent in one measurement.
    pub max_duration: Time,
    /// Discard cached problem instances between sweep wraps so repeated
    /// passes use freshly generated inputs.
    pub randomize_inputs: bool,
}

/// An event streamed from the worker to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// The ordered list of tasks this worker can execute.
    TaskList {
        /// Task names in registry order.
        tasks: Vec<String>,
    },
    /// The worker is about to measure one (task, size) cell.
    WillMeasure {
        /// Task name.
        task: String,
        /// Input size.
        size: u64,
    },
    /// One completed measurement.
    DidMeasure {
        /// Task name.
        task: String,
        /// Input size.
        size: u64,
        /// Elapsed time per iteration.
        elapsed: Time,
    },
    /// A line of the worker's own standard output, forwarded in-band so it
    /// cannot corrupt the protocol stream.
    Stdout {
        /// The text of the line, without the trailing newline.
        text: String,
    },
    /// The worker hit a fatal error and is about to end its stream.
    Failed {
        /// Human-readable description.
        message: String,
    },
}
