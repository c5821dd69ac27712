//! fiberpool - CLI

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde::Serialize;

use fiberpool::runtime::scheduler::{StackSize, StatsSnapshot};
use fiberpool::util::logger::{self, LogLevel};
use fiberpool::util::config;
use fiberpool::{
    DrainPolicy, RuntimeContext, Scheduler, TaskBuilder, TaskOutcome, TaskPriority, NAME, VERSION,
};

/// Cooperative lightweight-task scheduler
#[derive(Parser, Debug)]
#[command(name = "fiberpool")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.config/fiberpool/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output (same as `--log-level debug`)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level for scheduler events: debug, info, warn or error
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a batch of tagged tasks and report the order they ran in
    Run {
        /// Number of tasks to register
        #[arg(short, long, default_value_t = 8)]
        tasks: usize,

        /// Number of worker threads (overrides the config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Priorities assigned to tasks in turn, e.g. "low,high,low"
        #[arg(short, long, value_delimiter = ',', default_value = "normal")]
        priorities: Vec<TaskPriority>,

        /// Run every queued task before shutting down
        #[arg(long)]
        drain: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved stack size of every class
    StackSizes,

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Serialize)]
struct RunReport {
    order: Vec<usize>,
    outcomes: Vec<TaskOutcome>,
    stats: StatsSnapshot,
}

fn main() -> Result<()> {
    let args = Args::parse();

    match (args.verbose, args.log_level) {
        (true, _) => logger::init_debug(),
        (false, Some(level)) => logger::init_with_level(level),
        (false, None) => logger::init(),
    }

    let mut cfg = config::load_config(args.config.as_deref()).context("Failed to load config")?;

    match args.command {
        Commands::Run {
            tasks,
            workers,
            priorities,
            drain,
            json,
        } => {
            if let Some(workers) = workers {
                cfg.num_workers = workers;
            }
            if drain {
                cfg.drain_policy = DrainPolicy::Drain;
            }
            cfg.autostart = false;

            let report = run_batch(cfg, tasks, &priorities)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("order: {:?}", report.order);
                println!("stats: {:?}", report.stats);
            }
        }
        Commands::StackSizes => {
            for class in StackSize::ALL {
                println!("{:<8} {:>10}", class.name(), cfg.stack_size(class));
            }
        }
        Commands::Config => {
            print!("{}", config::to_toml_string(&cfg)?);
        }
    }

    Ok(())
}

fn run_batch(
    cfg: fiberpool::SchedulerConfig,
    tasks: usize,
    priorities: &[TaskPriority],
) -> Result<RunReport> {
    let context = RuntimeContext::global();
    context.initialize();

    let scheduler =
        Scheduler::new(context.clone(), cfg).context("Failed to create scheduler")?;
    let order = Arc::new(Mutex::new(Vec::with_capacity(tasks)));

    let mut handles = Vec::with_capacity(tasks);
    for tag in 0..tasks {
        let priority = priorities
            .get(tag % priorities.len().max(1))
            .copied()
            .unwrap_or_default();
        let order = order.clone();
        let handle = scheduler
            .register(
                move || order.lock().push(tag),
                TaskBuilder::new()
                    .description(format!("task-{}", tag))
                    .priority(priority),
            )
            .with_context(|| format!("Failed to register task {}", tag))?;
        handles.push(handle);
    }

    scheduler.start().context("Failed to start workers")?;
    let outcomes = handles
        .iter()
        .filter_map(|handle| handle.wait())
        .collect();
    scheduler.shutdown();

    let order = order.lock().clone();
    Ok(RunReport {
        order,
        outcomes,
        stats: scheduler.stats(),
    })
}
