//! The `imgrake crawl` command.

use clap::Args;
use imgrake_core::{
    keywords, progress, BingSource, Config, HarvestError, IndexWindow, JobState, KeywordJob,
    Orchestrator, ProgressLog,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::expand_path;
use super::summary::{create_progress_bar, run_summary};

/// Arguments for the `crawl` command. Unset flags fall back to the config file.
#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Newline-delimited keyword list
    #[arg(short, long)]
    pub keywords: Option<PathBuf>,

    /// Target number of images per keyword
    #[arg(short = 'n', long)]
    pub max_images: Option<usize>,

    /// Target width of normalized images
    #[arg(long)]
    pub width: Option<u32>,

    /// Target height of normalized images
    #[arg(long)]
    pub height: Option<u32>,

    /// Storage root for the per-keyword directories
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Progress log file
    #[arg(long)]
    pub progress_log: Option<PathBuf>,

    /// First keyword index to process
    #[arg(long)]
    pub lower: Option<usize>,

    /// Index to stop before; negative means no bound
    #[arg(long, default_value = "-1", allow_negative_numbers = true)]
    pub upper: i64,

    /// Discovery (feeder) workers per keyword
    #[arg(long)]
    pub feeder_threads: Option<usize>,

    /// Extraction (parser) workers per keyword
    #[arg(long)]
    pub parser_threads: Option<usize>,

    /// Download workers per keyword
    #[arg(long)]
    pub downloader_threads: Option<usize>,

    /// Start after the last keyword recorded in the progress log
    #[arg(long)]
    pub resume: bool,

    /// Also write the run statistics as JSON to this file
    #[arg(long)]
    pub stats_json: Option<PathBuf>,
}

impl CrawlArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(path) = &self.keywords {
            config.storage.keyword_list = expand_path(path);
        }
        if let Some(path) = &self.root {
            config.storage.root = expand_path(path);
        }
        if let Some(path) = &self.progress_log {
            config.storage.progress_log = expand_path(path);
        }
        if let Some(n) = self.max_images {
            config.crawl.max_num_images = n;
        }
        if let Some(w) = self.width {
            config.image.width = w;
        }
        if let Some(h) = self.height {
            config.image.height = h;
        }
        if let Some(n) = self.feeder_threads {
            config.crawl.feeder_threads = n;
        }
        if let Some(n) = self.parser_threads {
            config.crawl.parser_threads = n;
        }
        if let Some(n) = self.downloader_threads {
            config.crawl.downloader_threads = n;
        }
        config.validate()?;
        Ok(())
    }

    /// Index window for this run. An explicit `--lower` wins over `--resume`.
    pub fn window(&self, progress_log: &Path) -> anyhow::Result<IndexWindow> {
        let lower = match self.lower {
            Some(lower) => lower,
            None if self.resume => {
                let resumed = progress::resume_index(progress_log)?.unwrap_or(0);
                tracing::info!("Resuming from keyword index {resumed}");
                resumed
            }
            None => 0,
        };
        Ok(IndexWindow::from_signed(lower, self.upper))
    }
}

/// Number of keywords a window covers in a list of `len`.
fn window_len(window: IndexWindow, len: usize) -> u64 {
    let end = window.upper.map_or(len, |upper| upper.min(len));
    end.saturating_sub(window.lower) as u64
}

/// Execute the crawl command.
pub async fn execute(args: CrawlArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config)?;
    let log_path = config.progress_log();
    let window = args.window(&log_path)?;

    let source = Arc::new(BingSource::new(&config.crawl, &config.limits)?);
    let job = KeywordJob::from_config(&config, source);
    let log = ProgressLog::open(&log_path).map_err(|e| {
        anyhow::anyhow!("Cannot open progress log {}: {e}", log_path.display())
    })?;
    let mut orchestrator = Orchestrator::new(job, log);

    let list_path = config.keyword_list();
    let stats = match keywords::load(&list_path) {
        Ok(list) => {
            tracing::info!("Loaded {} keyword(s) from {:?}", list.len(), list_path);
            let pb = create_progress_bar(window_len(window, list.len()));
            let stats = orchestrator
                .run_with(&list, window, |report| {
                    pb.inc(1);
                    match report.state {
                        JobState::Failed => pb.set_message(format!("{} failed", report.keyword)),
                        _ => pb.set_message(report.keyword.to_string()),
                    }
                })
                .await;
            pb.finish_and_clear();
            stats
        }
        Err(e) => orchestrator.abort_run(e),
    };

    if let Err(e) = orchestrator.into_log().flush() {
        tracing::warn!("Cannot flush progress log: {e}");
    }
    eprintln!("{}", run_summary(&stats));

    if let Some(path) = &args.stats_json {
        write_stats(&expand_path(path), &stats)?;
    }
    if let Some(fatal) = &stats.fatal_error {
        anyhow::bail!("Run aborted: {fatal}");
    }
    Ok(())
}

fn write_stats(path: &Path, stats: &imgrake_core::RunStatistics) -> Result<(), HarvestError> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json)?;
    tracing::info!("Run statistics written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CrawlArgs,
    }

    fn parse(argv: &[&str]) -> CrawlArgs {
        TestCli::parse_from(std::iter::once("crawl").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "--keywords",
            "kw.txt",
            "--max-images",
            "5",
            "--width",
            "64",
            "--height",
            "48",
            "--downloader-threads",
            "3",
        ]);
        let mut config = Config::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.storage.keyword_list, PathBuf::from("kw.txt"));
        assert_eq!(config.crawl.max_num_images, 5);
        assert_eq!((config.image.width, config.image.height), (64, 48));
        assert_eq!(config.crawl.downloader_threads, 3);
        assert_eq!(config.crawl.feeder_threads, 2);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let args = parse(&["--parser-threads", "0"]);
        let mut config = Config::default();
        let err = args.apply(&mut config).unwrap_err();
        assert!(err.to_string().contains("crawl.parser_threads"));
    }

    #[test]
    fn test_width_above_decode_limit_rejected() {
        let args = parse(&["--width", "12000"]);
        let mut config = Config::default();
        let err = args.apply(&mut config).unwrap_err();
        assert!(err.to_string().contains("limits.max_image_dimension"));
    }

    #[test]
    fn test_negative_upper_is_unbounded() {
        let args = parse(&["--lower", "3", "--upper", "-1"]);
        let window = args.window(Path::new("/nonexistent/progress.txt")).unwrap();
        assert_eq!(window, IndexWindow::new(3, None));

        let args = parse(&["--upper", "10"]);
        let window = args.window(Path::new("/nonexistent/progress.txt")).unwrap();
        assert_eq!(window, IndexWindow::new(0, Some(10)));
    }

    #[test]
    fn test_resume_reads_progress_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("progress.txt");
        std::fs::write(
            &log,
            "2026-10-18T09:00:01.000Z INFO: done 0\tfetched=1\tkept=1\trewritten=0\tquarantined=0\n\
             2026-10-18T09:00:02.000Z ERROR: failed 1\tdirectory_ready\tboom\n",
        )
        .unwrap();

        let window = parse(&["--resume"]).window(&log).unwrap();
        assert_eq!(window.lower, 2);

        let window = parse(&["--resume", "--lower", "1"]).window(&log).unwrap();
        assert_eq!(window.lower, 1);
    }

    #[test]
    fn test_window_len() {
        assert_eq!(window_len(IndexWindow::new(0, None), 5), 5);
        assert_eq!(window_len(IndexWindow::new(2, Some(4)), 5), 2);
        assert_eq!(window_len(IndexWindow::new(7, None), 5), 0);
    }

    #[test]
    fn test_write_stats_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stats = imgrake_core::RunStatistics {
            keywords_processed: 2,
            ..Default::default()
        };
        write_stats(&path, &stats).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["keywords_processed"], 2);
        assert!(value.get("fatal_error").is_none());
    }
}
