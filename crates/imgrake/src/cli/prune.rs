//! The `imgrake prune` command.

use clap::Args;
use imgrake_core::pipeline::SweepMode;
use imgrake_core::Config;
use std::path::PathBuf;

use super::normalize::run_sweep;

/// Arguments for the `prune` command.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Storage root holding the work directories
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Skip this many work directories (in name order)
    #[arg(long, default_value = "0")]
    pub resume_index: usize,

    /// Artifacts checked concurrently per directory
    #[arg(short, long)]
    pub parallel: Option<usize>,
}

/// Execute the prune command: delete every artifact that does not decode.
pub async fn execute(args: PruneArgs, config: Config) -> anyhow::Result<()> {
    run_sweep(
        config,
        SweepMode::Prune,
        args.root,
        args.parallel,
        args.resume_index,
    )
    .await
}
