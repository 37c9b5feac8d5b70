//! Run options
//!
//! The user-tunable knobs of a measurement run, plus their resolution into
//! the concrete request a worker receives.

use crate::planner::SizeSweepPlanner;
use serde::{Deserialize, Serialize};
use sweepbench_ipc::RunRequest;
use sweepbench_stats::Time;

/// Options governing a measurement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Smallest size scale (exponent of two) to sweep.
    pub lowest_scale: u32,
    /// Largest size scale (exponent of two) to sweep.
    pub highest_scale: u32,
    /// Sizes per doubling.
    pub subdivisions: u32,
    /// Iterations folded into one timed batch before adaptive doubling.
    pub iterations: u64,
    /// Minimum time one batch must take for its sample to count.
    pub min_duration: Time,
    /// Cap on the total time spent on one measurement; zero means no cap.
    pub max_duration: Time,
    /// Regenerate problem instances on every wrap of the sweep.
    pub randomize_inputs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            lowest_scale: 0,
            highest_scale: 20,
            subdivisions: 1,
            iterations: 1,
            min_duration: Time::from_microseconds(10),
            max_duration: Time::ZERO,
            randomize_inputs: false,
        }
    }
}

impl RunOptions {
    /// The size planner these options describe.
    pub fn planner(&self) -> SizeSweepPlanner {
        SizeSweepPlanner::new(self.lowest_scale, self.highest_scale, self.subdivisions)
    }

    /// Resolves these options and a task selection into a worker request.
    pub fn to_request(&self, tasks: Vec<String>) -> RunRequest {
        RunRequest {
            tasks,
            sizes: self.planner().sizes(),
            iterations: self.iterations.max(1),
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            randomize_inputs: self.randomize_inputs,
        }
    }
}
