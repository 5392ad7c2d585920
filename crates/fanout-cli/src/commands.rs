//! CLI command definitions.

use clap::{Args, Subcommand, ValueEnum};
use fanout_core::config::ConfigOverrides;
use fanout_core::trigger::TriggerKind;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Build every matrix job and publish the artifacts
    Run(RunArgs),

    /// Print the jobs the matrix expands to
    Expand(ConfigArgs),

    /// Validate the run configuration
    Validate(ConfigArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Path to the run configuration
    #[arg(short, long, default_value = "fanout.yaml")]
    pub config: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Recipe directory passed to the build tool
    #[arg(short, long)]
    pub recipe: PathBuf,

    /// Path to the run configuration (axes, build and publish settings)
    #[arg(short, long, default_value = "fanout.yaml")]
    pub config: PathBuf,

    /// What started this run
    #[arg(short, long, default_value = "manual")]
    pub trigger: TriggerKind,

    /// Maximum number of jobs building at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep building after a job fails
    #[arg(long)]
    pub no_fail_fast: bool,

    /// Per-job timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Root of the per-job output folders
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Build but do not publish
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            concurrency: self.concurrency,
            fail_fast: self.no_fail_fast.then_some(false),
            job_timeout_secs: self.timeout,
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
