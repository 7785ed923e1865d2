use std::path::PathBuf;

use clap::Parser;
use rmsched_core::ExhaustionPolicy;

/// Rate-monotonic multiprocessor scheduling simulator.
///
/// Runs a task set on simulated processors that share a resource pool,
/// printing progress and a utilization report as it goes.
#[derive(Parser, Debug)]
#[command(name = "rmsched", about = "Rate-monotonic multiprocessor scheduling simulator")]
pub struct CliArgs {
    /// Path to a TOML simulation config (uses the built-in reference task set if not set)
    #[arg(long, env = "RMSCHED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Stop the simulation after this many seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Report interval in milliseconds (overrides the config)
    #[arg(long)]
    pub monitor_interval_ms: Option<u64>,

    /// Print reports as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Behavior when the pool cannot satisfy a task: halt or requeue
    #[arg(long)]
    pub exhaustion_policy: Option<ExhaustionPolicy>,

    /// Let processors exit once no work is left
    #[arg(long)]
    pub exit_when_drained: bool,
}
