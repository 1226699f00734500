//! Command line entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;

use crate::benchmark::Benchmark;
use crate::config::Config;
use crate::observability;
use crate::runner::ThreadRunner;

/// Synthetic load generator for metadata stores.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// number of worker threads, overriding the configuration
    #[argh(option, short = 't')]
    pub threads: Option<usize>,

    /// do not draw progress bars
    #[argh(switch)]
    pub no_progress: bool,
}

/// Parses the command line, runs the configured benchmark and prints one report per workload.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(threads) = args.threads {
        config.thread_env_config.num_threads = threads;
    }

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    let mut benchmark =
        Benchmark::new(&config.workload_configs).context("invalid workload configuration")?;
    let runner = ThreadRunner::new(config.mlmd_config, &config.thread_env_config)
        .context("invalid thread configuration")?
        .with_progress(!args.no_progress);

    let reports = runner.run_with(&mut benchmark, |report| {
        println!();
        println!("{report}");
    })?;

    if reports.is_empty() {
        tracing::warn!("no workloads configured");
    }

    Ok(())
}
