//! Measurement-execution engine.
//!
//! Supervises one external worker process at a time, plans geometric size
//! sweeps, aggregates the measurements the worker streams back, and
//! persists the results. The worker side of the protocol lives in
//! `sweepbench-worker`; the shared wire types in `sweepbench-ipc`.

#![warn(missing_docs)]

mod controller;
mod document;
mod options;
mod planner;
mod scheduler;
mod store;

pub use controller::{
    ControllerError, EventSender, OutputStream, ProcessController, ProcessEvent, ProcessHandle,
    WorkerBackend,
};
pub use document::{ResultDocument, StoreError};
pub use options::RunOptions;
pub use planner::{SizeSweepPlanner, MAX_SCALE};
pub use scheduler::{Followup, RunScheduler, SchedulerError, SchedulerState};
pub use store::{ResultStore, TaskResults};
