//! The `imgrake normalize` command, plus the sweep runner shared with `prune`.

use clap::Args;
use imgrake_core::pipeline::{sweep::work_dirs, SweepMode};
use imgrake_core::{Config, Normalizer, Sweep};
use std::path::PathBuf;
use std::time::Instant;

use super::expand_path;
use super::summary::{create_progress_bar, sweep_summary};

/// Arguments for the `normalize` command.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Storage root holding the work directories
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Target width
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height
    #[arg(long)]
    pub height: Option<u32>,

    /// Skip this many work directories (in name order)
    #[arg(long, default_value = "0")]
    pub resume_index: usize,

    /// Artifacts normalized concurrently per directory
    #[arg(short, long)]
    pub parallel: Option<usize>,
}

/// Execute the normalize command.
pub async fn execute(args: NormalizeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(w) = args.width {
        config.image.width = w;
    }
    if let Some(h) = args.height {
        config.image.height = h;
    }
    run_sweep(
        config,
        SweepMode::Normalize,
        args.root,
        args.parallel,
        args.resume_index,
    )
    .await
}

/// Run a sweep over the storage root with a progress bar and summary table.
pub(crate) async fn run_sweep(
    mut config: Config,
    mode: SweepMode,
    root: Option<PathBuf>,
    parallel: Option<usize>,
    resume_index: usize,
) -> anyhow::Result<()> {
    if let Some(root) = &root {
        config.storage.root = expand_path(root);
    }
    if let Some(n) = parallel {
        config.normalize.parallel_workers = n;
    }
    config.validate()?;

    let root = config.storage_root();
    let total = work_dirs(&root)?.len();
    if total == 0 {
        tracing::warn!("No work directories found under {:?}", root);
        return Ok(());
    }
    tracing::info!(
        "{:?} sweep over {} director(ies) under {:?}, starting at {}",
        mode,
        total,
        root,
        resume_index
    );

    let sweep = Sweep::new(
        Normalizer::from_config(&config),
        config.normalize.parallel_workers,
    );
    let pb = create_progress_bar(total.saturating_sub(resume_index) as u64);
    let start = Instant::now();

    let report = sweep
        .run(&root, mode, resume_index, |index, _, summary| {
            pb.inc(1);
            pb.set_message(format!("#{index}: {} quarantined", summary.quarantined));
        })
        .await?;

    pb.finish_and_clear();
    eprintln!("{}", sweep_summary(&report, start.elapsed()));
    Ok(())
}
