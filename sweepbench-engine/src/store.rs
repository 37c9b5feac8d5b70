//! Result store
//!
//! The in-memory accumulation of every measurement the scheduler has seen,
//! organized task by task and size by size. Tasks carry two orthogonal
//! flags: whether the user selected them, and whether the loaded worker can
//! run them. Only tasks with both participate in a run; results for
//! deselected or no-longer-runnable tasks are kept.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use sweepbench_stats::{Band, BandValue, SampleAggregator, Time};

/// Everything known about one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResults {
    /// Whether the user wants this task measured.
    pub selected: bool,
    /// Whether the currently loaded worker offers this task.
    pub runnable: bool,
    /// Aggregated samples keyed by input size.
    pub samples: BTreeMap<u64, SampleAggregator>,
}

impl TaskResults {
    /// Evaluates `band` at every size that can produce a value, ascending.
    pub fn band_values(&self, band: Band) -> Vec<(u64, BandValue)> {
        self.samples
            .iter()
            .filter_map(|(&size, aggregate)| Some((size, band.evaluate(aggregate)?)))
            .collect()
    }
}

/// All accumulated results, keyed by task name.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    tasks: BTreeMap<String, TaskResults>,
}

impl ResultStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one measurement into the (task, size) cell, creating the task
    /// entry if the name is new. New tasks discovered through measurements
    /// count as selected, since the worker was asked to run them.
    pub fn record(&mut self, task: &str, size: u64, elapsed: Time) {
        let entry = self.tasks.entry(task.to_string()).or_insert_with(|| {
            TaskResults {
                selected: true,
                runnable: true,
                ..TaskResults::default()
            }
        });
        entry.samples.entry(size).or_default().add_measurement(elapsed);
    }

    /// Folds a whole aggregate into the (task, size) cell, as [`record`]
    /// does for one sample. Used when restoring saved results.
    ///
    /// [`record`]: ResultStore::record
    pub fn merge(&mut self, task: &str, size: u64, aggregate: &SampleAggregator) {
        let entry = self.tasks.entry(task.to_string()).or_insert_with(|| {
            TaskResults {
                selected: true,
                runnable: false,
                ..TaskResults::default()
            }
        });
        entry.samples.entry(size).or_default().add_sample(aggregate);
    }

    /// Replaces the runnable set with `tasks`. Known tasks missing from the
    /// list become non-runnable but keep their results and selection; new
    /// tasks start selected.
    pub fn set_runnable_tasks(&mut self, tasks: &[String]) {
        for results in self.tasks.values_mut() {
            results.runnable = false;
        }
        for name in tasks {
            match self.tasks.get_mut(name) {
                Some(results) => results.runnable = true,
                None => {
                    self.tasks.insert(
                        name.clone(),
                        TaskResults {
                            selected: true,
                            runnable: true,
                            ..TaskResults::default()
                        },
                    );
                }
            }
        }
    }

    /// Selects or deselects one task. Unknown names are ignored.
    pub fn set_selected(&mut self, task: &str, selected: bool) {
        if let Some(results) = self.tasks.get_mut(task) {
            results.selected = selected;
        }
    }

    /// The tasks a run would measure: selected and runnable, in name order.
    pub fn selected_runnable(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|(_, r)| r.selected && r.runnable)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Every known task name, in name order.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// One task's results.
    pub fn task(&self, name: &str) -> Option<&TaskResults> {
        self.tasks.get(name)
    }

    /// Iterates all tasks in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskResults)> {
        self.tasks.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Discards every aggregate whose size falls inside `range`, across all
    /// tasks. Selection and runnability are untouched.
    pub fn delete_results_in(&mut self, range: RangeInclusive<u64>) {
        for results in self.tasks.values_mut() {
            results.samples.retain(|size, _| !range.contains(size));
        }
    }

    /// Discards all aggregates, keeping task entries and their flags.
    pub fn clear_results(&mut self) {
        for results in self.tasks.values_mut() {
            results.samples.clear();
        }
    }

    /// Total sample count over every task and size.
    pub fn sample_count(&self) -> u64 {
        self.tasks
            .values()
            .flat_map(|r| r.samples.values())
            .map(|a| a.count())
            .sum()
    }
}
