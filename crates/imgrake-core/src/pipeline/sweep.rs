//! Sweeps over every work directory under the storage root.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::normalize::Normalizer;
use crate::error::{PipelineError, PipelineResult};
use crate::types::NormalizeSummary;

/// What a sweep should do to each artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Full normalization: rewrite to the canonical shape or quarantine
    Normalize,
    /// Decode-only: delete artifacts that do not decode
    Prune,
}

/// Totals of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Directories visited
    pub directories: usize,
    /// Directories skipped because of the resume index
    pub skipped: usize,
    /// Directories that could not be read
    pub failed: usize,
    pub summary: NormalizeSummary,
}

/// Work directories directly under `root`, sorted by name.
///
/// Hidden entries and plain files are ignored.
pub fn work_dirs(root: &Path) -> PipelineResult<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| PipelineError::io(root, e))?;
    if !meta.is_dir() {
        return Err(PipelineError::Destination {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let dirs = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.into_path())
        .collect();
    Ok(dirs)
}

/// Runs a [`Normalizer`] over whole work directories.
pub struct Sweep {
    normalizer: Normalizer,
    parallel: usize,
}

impl Sweep {
    pub fn new(normalizer: Normalizer, parallel: usize) -> Self {
        Self {
            normalizer,
            parallel,
        }
    }

    /// Sweep every work directory under `root`, skipping the first `resume_index`.
    ///
    /// `on_dir` is called after each visited directory with its position in
    /// the sorted order and its counts.
    pub async fn run<F>(
        &self,
        root: &Path,
        mode: SweepMode,
        resume_index: usize,
        mut on_dir: F,
    ) -> PipelineResult<SweepReport>
    where
        F: FnMut(usize, &Path, &NormalizeSummary),
    {
        let dirs = work_dirs(root)?;
        let mut report = SweepReport {
            skipped: resume_index.min(dirs.len()),
            ..SweepReport::default()
        };

        for (index, dir) in dirs.iter().enumerate().skip(resume_index) {
            let result = match mode {
                SweepMode::Normalize => self.normalizer.normalize_dir(dir, self.parallel).await,
                SweepMode::Prune => self.normalizer.prune_dir(dir, self.parallel).await,
            };
            match result {
                Ok(summary) => {
                    tracing::debug!(
                        "[{index}] {:?}: kept {}, quarantined {}",
                        dir,
                        summary.kept,
                        summary.quarantined
                    );
                    report.directories += 1;
                    report.summary.merge(&summary);
                    on_dir(index, dir, &summary);
                }
                Err(e) => {
                    tracing::warn!("[{index}] Skipping {:?}: {e}", dir);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
