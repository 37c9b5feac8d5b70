#![warn(missing_docs)]
//! Sweepbench CLI
//!
//! Drives a worker executable through the measurement engine from the
//! command line: list its tasks, measure them for a while and save the
//! aggregated results, or export saved results as CSV.
//!
//! # Example
//!
//! ```sh
//! sweepbench --worker target/release/examples/demo_worker list
//! sweepbench --worker target/release/examples/demo_worker 'array\..*' run --measure-for 30s
//! sweepbench export --band avg --band min
//! ```

mod config;
mod export;

pub use config::*;
pub use export::generate_csv;

use clap::{Parser, Subcommand};
use regex::Regex;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use sweepbench_engine::{
    ProcessController, ResultDocument, RunOptions, RunScheduler, SchedulerState, WorkerBackend,
};
use sweepbench_stats::Band;

/// How often the event loop wakes to check deadlines.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for a stopped worker to settle before giving up.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Sweepbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "sweepbench")]
#[command(author, version, about = "sweepbench - sweep-over-input-size benchmarking")]
pub struct Cli {
    /// Optional subcommand (list, run, export); defaults to run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter tasks by regex pattern
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Worker executable to measure (overrides sweepbench.toml)
    #[arg(long)]
    pub worker: Option<PathBuf>,

    /// Extra arguments passed to the worker
    #[arg(long = "worker-arg")]
    pub worker_args: Vec<String>,

    /// Results file to resume from and save to
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Smallest size scale (exponent of two)
    #[arg(long)]
    pub min_scale: Option<u32>,

    /// Largest size scale (exponent of two)
    #[arg(long)]
    pub max_scale: Option<u32>,

    /// Sizes per doubling of the size axis
    #[arg(long)]
    pub subdivisions: Option<u32>,

    /// Iterations folded into one timed batch
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Minimum duration of one measurement batch (e.g. "10us")
    #[arg(long)]
    pub min_duration: Option<String>,

    /// Cap on one measurement (e.g. "1s"; "0s" means uncapped)
    #[arg(long)]
    pub max_duration: Option<String>,

    /// Regenerate problem instances on every sweep wrap
    #[arg(long)]
    pub randomize_inputs: bool,

    /// Start from an empty result store instead of resuming
    #[arg(long)]
    pub fresh: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tasks the worker can execute
    List,
    /// Measure the selected tasks for a while, then save results (default)
    Run {
        /// How long to keep measuring before stopping (e.g. "30s", "5m")
        #[arg(long, default_value = "30s")]
        measure_for: String,
    },
    /// Export saved results as CSV
    Export {
        /// Band to export; repeat for several (min, max, avg, sigN, count)
        #[arg(long = "band", default_value = "avg")]
        bands: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the sweepbench CLI with the given arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the sweepbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sweepbench=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("sweepbench=info")
            .init();
    }

    // Discover sweepbench.toml configuration (CLI flags override)
    let config = SweepConfig::discover().unwrap_or_default();

    match cli.command {
        Some(Commands::List) => list_tasks(&cli, &config),
        Some(Commands::Export { ref bands, ref output }) => {
            export_results(&cli, &config, bands, output.as_deref())
        }
        Some(Commands::Run { ref measure_for }) => {
            run_measurements(&cli, &config, measure_for)
        }
        None => run_measurements(&cli, &config, "30s"),
    }
}

/// Resolve the worker executable: CLI wins, then sweepbench.toml.
fn resolve_worker(cli: &Cli, config: &SweepConfig) -> anyhow::Result<ProcessController> {
    let program = cli
        .worker
        .clone()
        .or_else(|| config.worker.program.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            anyhow::anyhow!("no worker executable; pass --worker or set worker.program in sweepbench.toml")
        })?;
    let args = if cli.worker_args.is_empty() {
        config.worker.args.clone()
    } else {
        cli.worker_args.clone()
    };
    Ok(ProcessController::new(program, args))
}

/// Build run options by layering: sweepbench.toml defaults, then CLI flags.
fn build_run_options(cli: &Cli, config: &SweepConfig) -> anyhow::Result<RunOptions> {
    let min_duration = match &cli.min_duration {
        Some(s) => SweepConfig::parse_duration(s)?,
        None => SweepConfig::parse_duration(&config.run.min_duration)?,
    };
    let max_duration = match &cli.max_duration {
        Some(s) => SweepConfig::parse_duration(s)?,
        None => SweepConfig::parse_duration(&config.run.max_duration)?,
    };
    Ok(RunOptions {
        lowest_scale: cli.min_scale.unwrap_or(config.run.lowest_scale),
        highest_scale: cli.max_scale.unwrap_or(config.run.highest_scale),
        subdivisions: cli.subdivisions.unwrap_or(config.run.subdivisions),
        iterations: cli.iterations.unwrap_or(config.run.iterations),
        min_duration,
        max_duration,
        randomize_inputs: cli.randomize_inputs || config.run.randomize_inputs,
    })
}

fn results_path(cli: &Cli, config: &SweepConfig) -> PathBuf {
    cli.results
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.results_path))
}

/// Pumps scheduler events until no process is live or `deadline` passes.
fn pump_until_settled<B: WorkerBackend>(
    scheduler: &mut RunScheduler<B>,
    deadline: Instant,
) -> anyhow::Result<()> {
    while scheduler.state().live_handle().is_some() {
        if Instant::now() >= deadline {
            anyhow::bail!("worker did not settle in time");
        }
        scheduler.pump_event(PUMP_INTERVAL)?;
    }
    Ok(())
}

/// Loads the worker's task list and leaves the scheduler in `Idle`.
fn load_task_list<B: WorkerBackend>(scheduler: &mut RunScheduler<B>) -> anyhow::Result<()> {
    scheduler.load_tasks()?;
    pump_until_settled(scheduler, Instant::now() + STOP_GRACE)?;
    if *scheduler.state() == SchedulerState::FailedWorker {
        anyhow::bail!("worker failed while listing tasks (run with --verbose for its stderr)");
    }
    Ok(())
}

fn list_tasks(cli: &Cli, config: &SweepConfig) -> anyhow::Result<()> {
    let controller = resolve_worker(cli, config)?;
    let mut scheduler = RunScheduler::new(controller, build_run_options(cli, config)?);
    load_task_list(&mut scheduler)?;

    let filter = Regex::new(&cli.filter)?;
    let mut total = 0;
    for (name, results) in scheduler.store().iter() {
        if results.runnable && filter.is_match(name) {
            println!("{name}");
            total += 1;
        }
    }
    println!("{total} tasks found.");
    Ok(())
}

fn run_measurements(cli: &Cli, config: &SweepConfig, measure_for: &str) -> anyhow::Result<()> {
    let measure_for = SweepConfig::parse_duration(measure_for)?;
    let measure_for = Duration::from_secs_f64(measure_for.as_seconds_f64().max(0.0));

    let controller = resolve_worker(cli, config)?;
    let options = build_run_options(cli, config)?;
    let path = results_path(cli, config);
    let mut scheduler = RunScheduler::new(controller, options.clone());

    // Resume from the previous results file unless --fresh
    if !cli.fresh && path.exists() {
        match ResultDocument::load(&path) {
            Ok(document) => {
                document.restore(scheduler.store_mut());
                tracing::info!(?path, "resumed previous results");
            }
            Err(e) => eprintln!("Warning: ignoring unreadable results file: {e}"),
        }
    }

    load_task_list(&mut scheduler)?;

    // Apply the task filter as the selection
    let filter = Regex::new(&cli.filter)?;
    for name in scheduler.store_mut().task_names() {
        let selected = filter.is_match(&name);
        scheduler.store_mut().set_selected(&name, selected);
    }

    scheduler.start()?;
    if *scheduler.state() == SchedulerState::Waiting {
        scheduler.stop();
        anyhow::bail!("no tasks match filter {:?}", cli.filter);
    }

    let before = scheduler.store().sample_count();
    let (low, high) = options.planner().bounds();
    println!(
        "Measuring {} task(s), sizes {low}..={high}, for {measure_for:?}...",
        scheduler.store().selected_runnable().len(),
    );

    let deadline = Instant::now() + measure_for;
    while Instant::now() < deadline {
        scheduler.pump_event(PUMP_INTERVAL)?;
        if !scheduler.is_active() {
            // The worker quit on its own (or failed); no point waiting out
            // the clock.
            break;
        }
    }
    scheduler.stop();
    pump_until_settled(&mut scheduler, Instant::now() + STOP_GRACE)?;
    scheduler.drain_events()?;

    ResultDocument::snapshot(scheduler.store(), scheduler.options()).save(&path)?;
    println!(
        "{} new sample(s), {} total. Results saved to: {}",
        scheduler.store().sample_count() - before,
        scheduler.store().sample_count(),
        path.display()
    );
    Ok(())
}

fn export_results(
    cli: &Cli,
    config: &SweepConfig,
    bands: &[String],
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let path = results_path(cli, config);
    let document = ResultDocument::load(&path)?;
    let mut store = sweepbench_engine::ResultStore::new();
    document.restore(&mut store);

    let bands = bands
        .iter()
        .map(|s| s.parse::<Band>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let csv = generate_csv(&store, &bands);
    if let Some(path) = output {
        let mut file = std::fs::File::create(path)?;
        file.write_all(csv.as_bytes())?;
        println!("Exported to: {}", path.display());
    } else {
        print!("{csv}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("args parse")
    }

    #[test]
    fn test_default_command_is_run_with_default_filter() {
        let cli = parse(&["sweepbench"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.filter, ".*");
    }

    #[test]
    fn test_run_options_layer_config_then_cli() {
        let mut config = SweepConfig::default();
        config.run.highest_scale = 16;
        config.run.min_duration = "1ms".to_string();

        let cli = parse(&["sweepbench", "--max-scale", "12", "run"]);
        let options = build_run_options(&cli, &config).unwrap();
        // CLI flag wins over config
        assert_eq!(options.highest_scale, 12);
        // Config wins over built-in default
        assert_eq!(
            options.min_duration,
            sweepbench_stats::Time::from_milliseconds(1)
        );
    }

    #[test]
    fn test_bad_duration_is_rejected() {
        let cli = parse(&["sweepbench", "--min-duration", "soon"]);
        assert!(build_run_options(&cli, &SweepConfig::default()).is_err());
    }

    #[test]
    fn test_export_bands_accumulate() {
        let cli = parse(&["sweepbench", "export", "--band", "min", "--band", "sig2"]);
        let Some(Commands::Export { bands, .. }) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(bands, vec!["min".to_string(), "sig2".to_string()]);
    }
}
