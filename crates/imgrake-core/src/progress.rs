//! The run progress log.
//!
//! An append-only, human-readable record of a crawl: one header per run, a
//! `start` line before each keyword, a `done`/`failed`/`skipped` line after it,
//! and the run totals at the end. A keyword's closing line is the only durable
//! resumption state, so it is flushed before the next keyword starts.
//!
//! ```text
//! 2026-10-18T09:12:03.551Z INFO: start 0	cat
//! 2026-10-18T09:12:41.007Z INFO: done 0	fetched=5	kept=4	rewritten=4	quarantined=1
//! ```

use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::types::{JobState, Keyword, KeywordReport, RunStatistics};

/// Explicit sink for progress records.
pub struct ProgressLog<W: Write> {
    writer: W,
}

impl ProgressLog<BufWriter<File>> {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ProgressLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        self.line("INFO", message)
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.line("ERROR", message)
    }

    fn line(&mut self, level: &str, message: &str) -> io::Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        writeln!(self.writer, "{timestamp} {level}: {message}")?;
        self.writer.flush()
    }

    pub fn run_header(&mut self, settings: &str) -> io::Result<()> {
        self.info(&format!(
            "imgrake {} run started: {settings}",
            env!("CARGO_PKG_VERSION")
        ))
    }

    pub fn keyword_started(&mut self, index: usize, keyword: &Keyword) -> io::Result<()> {
        self.info(&format!("start {index}\t{keyword}"))
    }

    pub fn keyword_finished(&mut self, report: &KeywordReport) -> io::Result<()> {
        let index = report.index;
        match report.state {
            JobState::Failed => {
                let state = report.failed_in.unwrap_or(JobState::Pending);
                let error = report.error.as_deref().unwrap_or("unknown error");
                self.error(&format!("failed {index}\t{state}\t{error}"))
            }
            JobState::Skipped => self.info(&format!("skipped {index}")),
            _ => self.info(&format!(
                "done {index}\tfetched={}\tkept={}\trewritten={}\tquarantined={}",
                report.fetched,
                report.normalize.kept,
                report.normalize.rewritten,
                report.normalize.quarantined
            )),
        }
    }

    pub fn run_finished(&mut self, stats: &RunStatistics) -> io::Result<()> {
        if let Some(fatal) = &stats.fatal_error {
            self.error(&format!("Run aborted: {fatal}"))?;
        }
        self.info(&format!(
            "Run finished in {:.1}s",
            stats.elapsed.as_secs_f64()
        ))?;
        self.info(&format!(
            "Total number of processed keywords: {}",
            stats.keywords_processed
        ))?;
        self.info(&format!(
            "Total number of skipped keywords: {}",
            stats.keywords_skipped
        ))?;
        self.info(&format!(
            "Total number of failed keywords: {}",
            stats.keywords_failed
        ))?;
        self.info(&format!(
            "Total number of fetched artifacts: {}",
            stats.artifacts_fetched
        ))?;
        self.info(&format!(
            "Total number of quarantined artifacts: {}",
            stats.artifacts_quarantined
        ))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Index to resume from after the run recorded at `path`: one past the
/// highest keyword with a closing record. `None` when the log is missing or
/// has no closing records.
pub fn resume_index(path: &Path) -> io::Result<Option<usize>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_resume_index(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse progress-log text for the resume index. Unrecognized lines are ignored.
pub fn parse_resume_index(content: &str) -> Option<usize> {
    content
        .lines()
        .filter_map(|line| line.split_once(": ").map(|(_, message)| message))
        .filter_map(|message| {
            let (kind, rest) = message.split_once(' ')?;
            if !matches!(kind, "done" | "failed" | "skipped") {
                return None;
            }
            rest.split('\t').next()?.trim().parse::<usize>().ok()
        })
        .max()
        .map(|highest| highest + 1)
}
