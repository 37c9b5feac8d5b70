#![warn(missing_docs)]
//! Sweepbench Worker Runtime
//!
//! The execution environment for measurement executables:
//! - `TaskDef` registry (tasks register themselves via `inventory`)
//! - problem-instance cache keyed by (task, size)
//! - the batched measurement loop with min/max duration bounds
//! - `WorkerMain`, the stdin request / stdout event pump
//!
//! A worker binary registers its tasks and calls `WorkerMain::new().run()`
//! from `main`.

mod runner;
mod worker;

pub use runner::Measurer;
pub use worker::WorkerMain;

use std::any::Any;

/// A named unit of work the worker can measure at a given input size.
///
/// `prepare` builds the problem instance for one size; returning `None`
/// declines the size, which the controller treats as a measurement gap, not
/// an error. `run` executes the task body once over the prepared instance.
#[derive(Debug)]
pub struct TaskDef {
    /// Unique task name; this is the key the controller selects tasks by.
    pub name: &'static str,
    /// Builds the problem instance for one input size.
    pub prepare: fn(usize) -> Option<Box<dyn Any + Send>>,
    /// Runs the task body once over the prepared instance.
    pub run: fn(&(dyn Any + Send)),
}

inventory::collect!(TaskDef);

/// All registered tasks, sorted by name for a deterministic task list.
pub fn registered_tasks() -> Vec<&'static TaskDef> {
    let mut tasks: Vec<_> = inventory::iter::<TaskDef>.into_iter().collect();
    tasks.sort_by_key(|t| t.name);
    tasks
}

/// Looks up one registered task by name.
pub fn find_task(name: &str) -> Option<&'static TaskDef> {
    inventory::iter::<TaskDef>.into_iter().find(|t| t.name == name)
}

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<TaskDef> {}
};
