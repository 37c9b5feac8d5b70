//! Configuration loading from sweepbench.toml
//!
//! A `sweepbench.toml` in the project root supplies defaults for the worker
//! executable and the run options. The file is discovered by walking up
//! from the current directory; CLI flags override whatever it says.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sweepbench_stats::Time;

/// Sweepbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SweepConfig {
    /// Worker process configuration
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Run option defaults
    #[serde(default)]
    pub run: RunConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which executable to measure and how to launch it
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    /// Path to the worker executable
    #[serde(default)]
    pub program: Option<String>,
    /// Extra arguments passed to the worker
    #[serde(default)]
    pub args: Vec<String>,
}

/// Defaults for the run options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Smallest size scale (exponent of two)
    #[serde(default)]
    pub lowest_scale: u32,
    /// Largest size scale (exponent of two)
    #[serde(default = "default_highest_scale")]
    pub highest_scale: u32,
    /// Sizes per doubling
    #[serde(default = "default_subdivisions")]
    pub subdivisions: u32,
    /// Iterations folded into one timed batch (e.g. for very short tasks)
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Minimum duration of one measurement batch (e.g. "10us", "1ms")
    #[serde(default = "default_min_duration")]
    pub min_duration: String,
    /// Cap on one measurement; "0s" means uncapped
    #[serde(default = "default_max_duration")]
    pub max_duration: String,
    /// Regenerate problem instances on every sweep wrap
    #[serde(default)]
    pub randomize_inputs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lowest_scale: 0,
            highest_scale: default_highest_scale(),
            subdivisions: default_subdivisions(),
            iterations: default_iterations(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            randomize_inputs: false,
        }
    }
}

fn default_highest_scale() -> u32 {
    20
}
fn default_subdivisions() -> u32 {
    1
}
fn default_iterations() -> u64 {
    1
}
fn default_min_duration() -> String {
    "10us".to_string()
}
fn default_max_duration() -> String {
    "0s".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where results are saved and resumed from
    #[serde(default = "default_results_path")]
    pub results_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
        }
    }
}

fn default_results_path() -> String {
    "target/sweepbench/results.json".to_string()
}

impl SweepConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from the current
    /// directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("sweepbench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parse one of the duration fields, e.g. "10us" or "1.5ms"
    pub fn parse_duration(s: &str) -> anyhow::Result<Time> {
        s.parse::<Time>()
            .map_err(|e| anyhow::anyhow!("invalid duration {s:?}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SweepConfig::default();
        assert_eq!(config.run.highest_scale, 20);
        assert_eq!(config.run.min_duration, "10us");
        assert!(config.worker.program.is_none());
        assert_eq!(config.output.results_path, "target/sweepbench/results.json");
    }

    #[test]
    fn test_parse_toml_applies_defaults() {
        let toml_str = r#"
            [worker]
            program = "target/release/examples/demo_worker"

            [run]
            highest_scale = 16
            min_duration = "1ms"
        "#;

        let config: SweepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.worker.program.as_deref(),
            Some("target/release/examples/demo_worker")
        );
        assert_eq!(config.run.highest_scale, 16);
        assert_eq!(config.run.min_duration, "1ms");
        // Defaults should still apply
        assert_eq!(config.run.subdivisions, 1);
        assert_eq!(config.run.max_duration, "0s");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            SweepConfig::parse_duration("10us").unwrap(),
            Time::from_microseconds(10)
        );
        assert_eq!(
            SweepConfig::parse_duration("0s").unwrap(),
            Time::ZERO
        );
        assert!(SweepConfig::parse_duration("ten seconds").is_err());
    }
}
