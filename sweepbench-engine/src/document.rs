//! Result persistence
//!
//! Results are saved as one JSON document holding the run options, the task
//! selection, and the per-task per-size aggregates. Restoring merges the
//! saved aggregates into a store with `add_sample`, whose associativity
//! guarantees the reconstructed statistics match the live ones exactly.
//! Saves go through a temporary file and an atomic rename so a crash never
//! leaves a half-written document behind.

use crate::options::RunOptions;
use crate::store::ResultStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sweepbench_stats::SampleAggregator;
use thiserror::Error;

/// Errors reading or writing a result document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document could not be read or written.
    #[error("failed to access result file {path:?}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The document is not valid JSON of the expected shape.
    #[error("result file {path:?} is malformed: {source}")]
    Malformed {
        /// The file involved.
        path: PathBuf,
        /// The underlying decode error.
        source: serde_json::Error,
    },
}

/// The on-disk form of a result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument {
    /// When the document was written.
    pub saved_at: DateTime<Utc>,
    /// The run options in effect at save time.
    pub options: RunOptions,
    /// Names of the tasks that were selected.
    pub selected_tasks: Vec<String>,
    /// Aggregates per task, per size.
    pub tasks: BTreeMap<String, BTreeMap<u64, SampleAggregator>>,
}

impl ResultDocument {
    /// Captures a store and its options as a document, timestamped now.
    pub fn snapshot(store: &ResultStore, options: &RunOptions) -> Self {
        let mut tasks = BTreeMap::new();
        let mut selected_tasks = Vec::new();
        for (name, results) in store.iter() {
            if results.selected {
                selected_tasks.push(name.to_string());
            }
            if !results.samples.is_empty() {
                tasks.insert(name.to_string(), results.samples.clone());
            }
        }
        Self {
            saved_at: Utc::now(),
            options: options.clone(),
            selected_tasks,
            tasks,
        }
    }

    /// Merges this document into `store`.
    ///
    /// Saved aggregates fold into whatever the store already holds, so
    /// loading over live results combines them rather than replacing them.
    /// The saved selection is applied to tasks the store knows about.
    pub fn restore(&self, store: &mut ResultStore) {
        for (name, sizes) in &self.tasks {
            for (&size, aggregate) in sizes {
                store.merge(name, size, aggregate);
            }
        }
        for name in store.task_names() {
            let selected = self.selected_tasks.contains(&name);
            store.set_selected(&name, selected);
        }
    }

    /// Writes the document to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_vec_pretty(self).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        tracing::info!(?path, tasks = self.tasks.len(), "results saved");
        Ok(())
    }

    /// Reads a document from `path`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}
