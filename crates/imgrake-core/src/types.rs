//! Core data types for the imgrake pipeline.
//!
//! These types describe the unit of work (a keyword), where its artifacts
//! live, and what happened to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A search term, exactly as it appears in the keyword list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword(String);

impl Keyword {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the line carries nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Keyword {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Lowercase hex digest of a keyword, used as its directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey(String);

impl ContentKey {
    pub(crate) fn from_hex(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pool sizes for the three acquisition roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Workers producing result-page references
    pub discovery: usize,
    /// Workers turning pages into image URLs
    pub extraction: usize,
    /// Workers downloading image bytes
    pub download: usize,
    /// Capacity of each inter-stage queue
    pub queue_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            discovery: 2,
            extraction: 4,
            download: 8,
            queue_size: 100,
        }
    }
}

/// Why an artifact was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    /// Bytes are not a decodable image
    Decode(String),
    /// Conversion, resize or encode failed after a successful decode
    Encode(String),
    /// File or decoded dimensions exceed configured limits
    TooLarge(String),
    /// Decode did not finish in time
    Timeout(String),
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineReason::Decode(msg) => write!(f, "decode error: {msg}"),
            QuarantineReason::Encode(msg) => write!(f, "encode error: {msg}"),
            QuarantineReason::TooLarge(msg) => write!(f, "too large: {msg}"),
            QuarantineReason::Timeout(msg) => write!(f, "timeout: {msg}"),
        }
    }
}

/// Result of normalizing one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The artifact is canonical at `path`. `rewritten` is false when it
    /// already was and nothing was written.
    Kept { path: PathBuf, rewritten: bool },
    /// The artifact was deleted.
    Quarantined(QuarantineReason),
}

impl Outcome {
    pub fn is_kept(&self) -> bool {
        matches!(self, Outcome::Kept { .. })
    }
}

/// Counts from normalizing a whole work directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeSummary {
    pub kept: u64,
    pub rewritten: u64,
    pub quarantined: u64,
}

impl NormalizeSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Kept { rewritten, .. } => {
                self.kept += 1;
                if *rewritten {
                    self.rewritten += 1;
                }
            }
            Outcome::Quarantined(_) => self.quarantined += 1,
        }
    }

    pub fn merge(&mut self, other: &NormalizeSummary) {
        self.kept += other.kept;
        self.rewritten += other.rewritten;
        self.quarantined += other.quarantined;
    }

    pub fn total(&self) -> u64 {
        self.kept + self.quarantined
    }
}

/// States of the per-keyword job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    DirectoryReady,
    Fetched,
    Normalized,
    Done,
    Failed,
    /// Blank keyword line; nothing to fetch
    Skipped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::DirectoryReady => "directory_ready",
            JobState::Fetched => "fetched",
            JobState::Normalized => "normalized",
            JobState::Done => "done",
            JobState::Failed => "failed",
            JobState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// What one keyword job produced.
#[derive(Debug, Clone)]
pub struct KeywordReport {
    pub index: usize,
    pub keyword: Keyword,
    /// Terminal state: `Done`, `Failed` or `Skipped`
    pub state: JobState,
    /// State the job was in when it failed
    pub failed_in: Option<JobState>,
    pub directory: Option<PathBuf>,
    pub fetched: u64,
    pub normalize: NormalizeSummary,
    pub error: Option<String>,
}

impl KeywordReport {
    pub(crate) fn new(index: usize, keyword: Keyword) -> Self {
        Self {
            index,
            keyword,
            state: JobState::Pending,
            failed_in: None,
            directory: None,
            fetched: 0,
            normalize: NormalizeSummary::default(),
            error: None,
        }
    }
}

/// Resumption window over the keyword list: `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexWindow {
    pub lower: usize,
    pub upper: Option<usize>,
}

impl IndexWindow {
    pub fn new(lower: usize, upper: Option<usize>) -> Self {
        Self { lower, upper }
    }

    /// Build from the CLI convention where a negative upper bound means unbounded.
    pub fn from_signed(lower: usize, upper: i64) -> Self {
        let upper = usize::try_from(upper).ok();
        Self { lower, upper }
    }

    pub fn is_below(&self, index: usize) -> bool {
        index < self.lower
    }

    pub fn is_past(&self, index: usize) -> bool {
        self.upper.is_some_and(|upper| index >= upper)
    }
}

/// Counters for one run. Reset every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Keywords that reached `Done`
    pub keywords_processed: u64,
    /// Keywords below the lower bound or blank
    pub keywords_skipped: u64,
    /// Keywords that ended in `Failed`
    pub keywords_failed: u64,
    pub artifacts_fetched: u64,
    pub artifacts_kept: u64,
    pub artifacts_rewritten: u64,
    pub artifacts_quarantined: u64,
    /// Set when the run stopped on a top-level error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Fold one keyword's report into the run totals.
    pub fn record(&mut self, report: &KeywordReport) {
        match report.state {
            JobState::Done => self.keywords_processed += 1,
            JobState::Failed => self.keywords_failed += 1,
            JobState::Skipped => self.keywords_skipped += 1,
            _ => {}
        }
        self.artifacts_fetched += report.fetched;
        self.artifacts_kept += report.normalize.kept;
        self.artifacts_rewritten += report.normalize.rewritten;
        self.artifacts_quarantined += report.normalize.quarantined;
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
