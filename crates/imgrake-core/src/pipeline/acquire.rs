//! Concurrent three-stage acquisition for one keyword.
//!
//! ```text
//! discovery (F workers) --pages--> extraction (P workers) --urls--> download (D workers) --> dir
//! ```
//!
//! Each arrow is a bounded queue. Once the target count has been written the
//! stop signal is raised: no worker picks up new work, in-flight downloads
//! finish, and closing receivers unwinds the upstream stages.

use futures_util::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::channel::{bounded_channel, PipelineStage, SharedReceiver, StopSignal};
use super::source::{Destination, ImageRef, ImageSource, PageRef, Shard};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{Keyword, WorkerConfig};

/// What one acquisition produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquireReport {
    /// Artifacts written to the destination
    pub written: usize,
    /// Result pages handed to extraction
    pub pages: usize,
    /// Image URLs handed to download
    pub candidates: usize,
    /// Downloads that failed and were skipped
    pub failed_downloads: usize,
}

#[derive(Default)]
struct Counters {
    written: AtomicUsize,
    pages: AtomicUsize,
    failed_downloads: AtomicUsize,
}

/// Runs the bounded discovery → extraction → download pipeline.
pub struct AcquisitionStage {
    source: Arc<dyn ImageSource>,
    keyword_timeout: Duration,
}

impl AcquisitionStage {
    pub fn new(source: Arc<dyn ImageSource>, keyword_timeout: Duration) -> Self {
        Self {
            source,
            keyword_timeout,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch up to roughly `target` artifacts for `keyword` into `dest_dir`.
    ///
    /// Individual page and download failures are skipped. An `Err` means the
    /// stage could not run at all (unwritable destination, an empty worker
    /// pool) or exceeded the keyword timeout.
    pub async fn fetch(
        &self,
        keyword: &Keyword,
        target: usize,
        workers: &WorkerConfig,
        dest_dir: &Path,
    ) -> PipelineResult<AcquireReport> {
        let destination = Arc::new(Destination::open(dest_dir)?);
        for (role, size) in [
            ("discovery", workers.discovery),
            ("extraction", workers.extraction),
            ("download", workers.download),
        ] {
            if size == 0 {
                return Err(PipelineError::Stage {
                    stage: "acquire".to_string(),
                    message: format!("{role} pool is empty"),
                });
            }
        }
        if target == 0 {
            return Ok(AcquireReport::default());
        }

        let stop = StopSignal::new();
        let counters = Arc::new(Counters::default());
        let (page_tx, page_rx) = bounded_channel::<PageRef>(workers.queue_size);
        let (url_tx, url_rx) = bounded_channel::<ImageRef>(workers.queue_size);
        let mut tasks: JoinSet<usize> = JoinSet::new();

        for index in 0..workers.discovery {
            let shard = Shard {
                index,
                count: workers.discovery,
            };
            tasks.spawn(feed(
                Arc::clone(&self.source),
                keyword.clone(),
                shard,
                target,
                page_tx.clone(),
                stop.clone(),
                Arc::clone(&counters),
            ));
        }
        drop(page_tx);

        for _ in 0..workers.extraction {
            let stage = PipelineStage::new("extract", page_rx.clone(), url_tx.clone(), stop.clone());
            let source = Arc::clone(&self.source);
            tasks.spawn(async move {
                stage
                    .run_fallible(|page| {
                        let source = Arc::clone(&source);
                        async move { source.extract(&page).await }
                    })
                    .await
            });
        }
        drop(page_rx);
        drop(url_tx);

        for _ in 0..workers.download {
            tasks.spawn(download_worker(
                Arc::clone(&self.source),
                url_rx.clone(),
                Arc::clone(&destination),
                target,
                stop.clone(),
                Arc::clone(&counters),
            ));
        }
        drop(url_rx);

        let mut candidates = 0usize;
        let drained = tokio::time::timeout(self.keyword_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(sent) => candidates += sent,
                    Err(e) => tracing::warn!("Acquisition worker for {:?} aborted: {e}", keyword.as_str()),
                }
            }
        })
        .await;

        if drained.is_err() {
            stop.stop();
            tasks.abort_all();
            return Err(PipelineError::Timeout {
                target: keyword.to_string(),
                stage: "acquire".to_string(),
                timeout_ms: self.keyword_timeout.as_millis() as u64,
            });
        }

        // Extraction workers report URLs sent; discovery and download report 0.
        let report = AcquireReport {
            written: counters.written.load(Ordering::Acquire),
            pages: counters.pages.load(Ordering::Acquire),
            candidates,
            failed_downloads: counters.failed_downloads.load(Ordering::Acquire),
        };
        tracing::debug!(
            "Acquired {} for {:?}: {} pages, {} candidates, {} failed downloads",
            report.written,
            keyword.as_str(),
            report.pages,
            report.candidates,
            report.failed_downloads
        );
        Ok(report)
    }
}

/// Discovery worker: forwards one shard of page references downstream.
async fn feed(
    source: Arc<dyn ImageSource>,
    keyword: Keyword,
    shard: Shard,
    target: usize,
    pages: mpsc::Sender<PageRef>,
    stop: StopSignal,
    counters: Arc<Counters>,
) -> usize {
    let mut stream = source.discover(&keyword, shard, target);
    while !stop.is_stopped() {
        let Some(next) = stream.next().await else {
            break;
        };
        match next {
            Ok(page) => {
                if pages.send(page).await.is_err() {
                    break;
                }
                counters.pages.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) => tracing::debug!("discover stage error: {e}"),
        }
    }
    0
}

/// Download worker: writes artifacts until the input drains or the target is met.
async fn download_worker(
    source: Arc<dyn ImageSource>,
    urls: SharedReceiver<ImageRef>,
    destination: Arc<Destination>,
    target: usize,
    stop: StopSignal,
    counters: Arc<Counters>,
) -> usize {
    while !stop.is_stopped() {
        let Some(image) = urls.recv().await else {
            break;
        };
        if counters.written.load(Ordering::Acquire) >= target {
            stop.stop();
            break;
        }
        match source.download(&image, &destination).await {
            Ok(path) => {
                let written = counters.written.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::trace!("Downloaded {} -> {:?}", image.url, path);
                if written >= target {
                    stop.stop();
                }
            }
            Err(e) => {
                counters.failed_downloads.fetch_add(1, Ordering::AcqRel);
                tracing::debug!("download stage error: {e}");
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{FakeSource, Payload};

    fn workers(discovery: usize, extraction: usize, download: usize) -> WorkerConfig {
        WorkerConfig {
            discovery,
            extraction,
            download,
            queue_size: 2,
        }
    }

    #[tokio::test]
    async fn test_fetch_writes_all_candidates_under_target() {
        let source = FakeSource::new().with_plan("cat", vec![Payload::Png(8, 8); 3]);
        let stage = AcquisitionStage::new(Arc::new(source), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();

        let report = stage
            .fetch(&Keyword::new("cat"), 10, &workers(2, 2, 3), dir.path())
            .await
            .unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(report.candidates, 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_stops_near_target() {
        let source = FakeSource::new().with_plan("cat", vec![Payload::Png(4, 4); 40]);
        let stage = AcquisitionStage::new(Arc::new(source), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();
        let downloaders = 3;

        let report = stage
            .fetch(&Keyword::new("cat"), 5, &workers(1, 1, downloaders), dir.path())
            .await
            .unwrap();

        assert!(report.written >= 5);
        assert!(report.written < 5 + downloaders);
        assert_eq!(
            std::fs::read_dir(dir.path()).unwrap().count(),
            report.written
        );
    }

    #[tokio::test]
    async fn test_fetch_swallows_unit_failures() {
        let source = FakeSource::new().with_plan(
            "cat",
            vec![Payload::Png(4, 4), Payload::Unreachable, Payload::Png(4, 4)],
        );
        let stage = AcquisitionStage::new(Arc::new(source), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();

        let report = stage
            .fetch(&Keyword::new("cat"), 10, &workers(1, 1, 1), dir.path())
            .await
            .unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(report.failed_downloads, 1);
    }

    #[tokio::test]
    async fn test_fetch_unknown_keyword_yields_nothing() {
        let stage = AcquisitionStage::new(Arc::new(FakeSource::new()), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();

        let report = stage
            .fetch(&Keyword::new("nothing"), 10, &workers(2, 2, 2), dir.path())
            .await
            .unwrap();
        assert_eq!(report, AcquireReport::default());
    }

    #[tokio::test]
    async fn test_fetch_missing_destination_is_stage_error() {
        let source = FakeSource::new().with_plan("cat", vec![Payload::Png(4, 4)]);
        let stage = AcquisitionStage::new(Arc::new(source), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();

        let err = stage
            .fetch(&Keyword::new("cat"), 1, &workers(1, 1, 1), &dir.path().join("gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Destination { .. }));
    }

    #[tokio::test]
    async fn test_fetch_empty_pool_is_stage_error() {
        let stage = AcquisitionStage::new(Arc::new(FakeSource::new()), Duration::from_secs(5));
        let dir = tempfile::tempdir().unwrap();

        let err = stage
            .fetch(&Keyword::new("cat"), 1, &workers(1, 0, 1), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extraction pool is empty"));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_hanging_source() {
        let source = FakeSource::new().hanging("slow");
        let stage = AcquisitionStage::new(Arc::new(source), Duration::from_millis(100));
        let dir = tempfile::tempdir().unwrap();

        let err = stage
            .fetch(&Keyword::new("slow"), 5, &workers(1, 1, 1), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { ref stage, .. } if stage == "acquire"));
    }
}
