//! The measurement loop
//!
//! One measurement of a (task, size) cell repeats the task body in a batch,
//! doubling the batch until at least `min_duration` was spent inside a
//! single batch (so short tasks are not dominated by timer granularity), or
//! until the `max_duration` cap on the whole measurement is reached. The
//! reported sample is batch elapsed time divided by the batch size, with
//! round-half-to-even division so averages carry no systematic bias.

use crate::TaskDef;
use std::any::Any;
use std::collections::HashMap;
use std::time::Instant;
use sweepbench_stats::Time;

/// Runs measurements and caches problem instances between them.
///
/// Instances are cached by (task, size) so every pass of the sweep measures
/// the same inputs; `discard_instances` implements the randomize-inputs mode
/// where each wrap regenerates them.
#[derive(Default)]
pub struct Measurer {
    instances: HashMap<(&'static str, u64), Box<dyn Any + Send>>,
}

impl Measurer {
    /// An empty measurer with no cached instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached problem instance.
    pub fn discard_instances(&mut self) {
        self.instances.clear();
    }

    /// Measures one (task, size) cell.
    ///
    /// Returns `None` when the task declines the size (no instance), which
    /// is a measurement gap rather than an error.
    pub fn measure(
        &mut self,
        task: &'static TaskDef,
        size: u64,
        iterations: u64,
        min_duration: Time,
        max_duration: Time,
    ) -> Option<Time> {
        let instance = match self.instances.entry((task.name, size)) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let prepared = (task.prepare)(usize::try_from(size).ok()?)?;
                entry.insert(prepared)
            }
        };

        let mut batch = iterations.max(1);
        let started = Instant::now();
        loop {
            let batch_started = Instant::now();
            for _ in 0..batch {
                (task.run)(instance.as_ref());
            }
            let elapsed = Time::from_nanoseconds(batch_started.elapsed().as_nanos() as i128);
            let spent = Time::from_nanoseconds(started.elapsed().as_nanos() as i128);
            if elapsed >= min_duration || (!max_duration.is_zero() && spent >= max_duration) {
                return Some(elapsed.dividing_with_rounding(batch as i128));
            }
            batch = batch.saturating_mul(2);
        }
    }
}
