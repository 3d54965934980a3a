//! Per-keyword job: directory setup, acquisition, normalization.
//!
//! ```text
//! Pending -> DirectoryReady -> Fetched -> Normalized -> Done
//!    \            \               \
//!     +------------+---------------+--> Failed
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::acquire::AcquisitionStage;
use super::address::work_dir;
use super::normalize::Normalizer;
use super::source::{ImageSource, INFO_FILE};
use crate::config::Config;
use crate::error::PipelineError;
use crate::types::{JobState, Keyword, KeywordReport, WorkerConfig};

/// Runs one keyword through the whole pipeline.
pub struct KeywordJob {
    root: PathBuf,
    acquisition: AcquisitionStage,
    normalizer: Normalizer,
    workers: WorkerConfig,
    target: usize,
    normalize_workers: usize,
}

impl KeywordJob {
    pub fn new(
        root: impl Into<PathBuf>,
        acquisition: AcquisitionStage,
        normalizer: Normalizer,
        workers: WorkerConfig,
        target: usize,
    ) -> Self {
        Self {
            root: root.into(),
            acquisition,
            normalizer,
            workers,
            target,
            normalize_workers: 4,
        }
    }

    /// Build a job from configuration and a fetch collaborator.
    pub fn from_config(config: &Config, source: Arc<dyn ImageSource>) -> Self {
        let acquisition =
            AcquisitionStage::new(source, Duration::from_millis(config.crawl.keyword_timeout_ms));
        Self::new(
            config.storage_root(),
            acquisition,
            Normalizer::from_config(config),
            config.workers(),
            config.crawl.max_num_images,
        )
        .with_normalize_workers(config.normalize.parallel_workers)
    }

    pub fn with_normalize_workers(mut self, workers: usize) -> Self {
        self.normalize_workers = workers.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One-line description of the job settings for the run header.
    pub fn describe(&self) -> String {
        let (width, height) = self.normalizer.target();
        format!(
            "root={} source={} max_images={} size={}x{} workers={}/{}/{}",
            self.root.display(),
            self.acquisition.source_name(),
            self.target,
            width,
            height,
            self.workers.discovery,
            self.workers.extraction,
            self.workers.download,
        )
    }

    /// Run the keyword at `index` to `Done`, `Failed` or `Skipped`.
    ///
    /// Never returns an error: every failure is folded into the report so the
    /// caller can move on to the next keyword.
    pub async fn run(&self, index: usize, keyword: &Keyword) -> KeywordReport {
        let mut report = KeywordReport::new(index, keyword.clone());
        if keyword.is_blank() {
            tracing::debug!("Keyword {index} is blank, skipping");
            report.state = JobState::Skipped;
            return report;
        }

        let dir = work_dir(&self.root, keyword);
        if let Err(e) = prepare_dir(&dir, keyword).await {
            return fail(report, e);
        }
        report.directory = Some(dir.clone());
        advance(&mut report, JobState::DirectoryReady);

        match self
            .acquisition
            .fetch(keyword, self.target, &self.workers, &dir)
            .await
        {
            Ok(acquired) => report.fetched = acquired.written as u64,
            Err(e) => return fail(report, e),
        }
        advance(&mut report, JobState::Fetched);

        match self.normalizer.normalize_dir(&dir, self.normalize_workers).await {
            Ok(summary) => report.normalize = summary,
            Err(e) => return fail(report, e),
        }
        advance(&mut report, JobState::Normalized);

        advance(&mut report, JobState::Done);
        report
    }
}

/// Create the work directory (idempotent) and (re)write its keyword record.
async fn prepare_dir(dir: &Path, keyword: &Keyword) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let info = dir.join(INFO_FILE);
    tokio::fs::write(&info, format!("{keyword}\n"))
        .await
        .map_err(|e| PipelineError::io(&info, e))
}

fn advance(report: &mut KeywordReport, next: JobState) {
    tracing::debug!(
        "Keyword {} {:?}: {} -> {}",
        report.index,
        report.keyword.as_str(),
        report.state,
        next
    );
    report.state = next;
}

fn fail(mut report: KeywordReport, error: PipelineError) -> KeywordReport {
    tracing::error!(
        "Keyword {} {:?} failed in {}: {error}",
        report.index,
        report.keyword.as_str(),
        report.state
    );
    report.failed_in = Some(report.state);
    report.error = Some(error.to_string());
    report.state = JobState::Failed;
    report
}
