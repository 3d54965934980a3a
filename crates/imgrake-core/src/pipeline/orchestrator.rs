//! Sequential driver over the keyword list.

use std::io::Write;
use std::path::Path;
use std::time::Instant;

use super::job::KeywordJob;
use crate::error::HarvestError;
use crate::keywords;
use crate::progress::ProgressLog;
use crate::types::{IndexWindow, Keyword, KeywordReport, RunStatistics};

/// Runs keyword jobs one after another over a resumable index window.
///
/// The progress log is handed in at construction and flushed after every
/// record; the caller gets it back with [`Orchestrator::into_log`].
pub struct Orchestrator<W: Write> {
    job: KeywordJob,
    log: ProgressLog<W>,
}

impl<W: Write> Orchestrator<W> {
    pub fn new(job: KeywordJob, log: ProgressLog<W>) -> Self {
        Self { job, log }
    }

    /// Read the keyword list at `path` and run it.
    ///
    /// An unreadable list is fatal before any keyword; it is still reported
    /// through the returned statistics and the progress log totals.
    pub async fn run_from_file<F>(
        &mut self,
        path: &Path,
        window: IndexWindow,
        on_report: F,
    ) -> RunStatistics
    where
        F: FnMut(&KeywordReport),
    {
        match keywords::load(path) {
            Ok(list) => self.run_with(&list, window, on_report).await,
            Err(e) => self.abort(Instant::now(), e),
        }
    }

    pub async fn run(&mut self, keywords: &[Keyword], window: IndexWindow) -> RunStatistics {
        self.run_with(keywords, window, |_| {}).await
    }

    /// Run every keyword in `window`, calling `on_report` after each one.
    ///
    /// Indices below the lower bound are counted as skipped without touching
    /// the filesystem. The run ends at the upper bound or the end of the list.
    pub async fn run_with<F>(
        &mut self,
        keywords: &[Keyword],
        window: IndexWindow,
        mut on_report: F,
    ) -> RunStatistics
    where
        F: FnMut(&KeywordReport),
    {
        let started = Instant::now();
        let mut stats = RunStatistics::default();

        let root = self.job.root().to_path_buf();
        if let Err(source) = std::fs::create_dir_all(&root) {
            return self.abort(started, HarvestError::StorageRoot { path: root, source });
        }

        let upper = window
            .upper
            .map_or_else(|| "unbounded".to_string(), |u| u.to_string());
        let header = format!(
            "keywords={} window=[{}, {}) {}",
            keywords.len(),
            window.lower,
            upper,
            self.job.describe()
        );
        record(self.log.run_header(&header));

        for (index, keyword) in keywords.iter().enumerate() {
            if window.is_past(index) {
                tracing::info!("Reached upper bound {upper}, stopping");
                break;
            }
            if window.is_below(index) {
                stats.keywords_skipped += 1;
                continue;
            }

            tracing::info!("[{index}] {}", keyword.as_str());
            record(self.log.keyword_started(index, keyword));

            let report = self.job.run(index, keyword).await;
            stats.record(&report);
            record(self.log.keyword_finished(&report));
            on_report(&report);
        }

        stats.elapsed = started.elapsed();
        record(self.log.run_finished(&stats));
        stats
    }

    /// Record a fatal error that prevented the run from starting.
    pub fn abort_run(&mut self, error: HarvestError) -> RunStatistics {
        self.abort(Instant::now(), error)
    }

    pub fn into_log(self) -> ProgressLog<W> {
        self.log
    }

    fn abort(&mut self, started: Instant, error: HarvestError) -> RunStatistics {
        tracing::error!("{error}");
        let stats = RunStatistics {
            fatal_error: Some(error.to_string()),
            elapsed: started.elapsed(),
            ..RunStatistics::default()
        };
        record(self.log.run_finished(&stats));
        stats
    }
}

fn record(result: std::io::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Cannot write progress log: {e}");
    }
}
