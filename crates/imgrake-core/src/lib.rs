//! imgrake core - resumable keyword image acquisition and normalization.
//!
//! Given an ordered keyword list, imgrake fetches candidate images for each
//! keyword into a content-addressed work directory and normalizes every file
//! into one canonical format and size, deleting whatever cannot be decoded.
//!
//! # Architecture
//!
//! ```text
//! keywords -> Orchestrator -> KeywordJob -> AcquisitionStage -> Normalizer -> progress log
//! ```
//!
//! Keywords run strictly one after another. Within a keyword, acquisition is
//! a bounded three-stage worker pipeline and normalization fans out over the
//! work directory once acquisition is done.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use imgrake_core::{BingSource, Config, IndexWindow, KeywordJob, Orchestrator, ProgressLog};
//!
//! #[tokio::main]
//! async fn main() -> imgrake_core::Result<()> {
//!     let config = Config::load()?;
//!     let source = Arc::new(BingSource::new(&config.crawl, &config.limits)?);
//!     let job = KeywordJob::from_config(&config, source);
//!     let log = ProgressLog::open(&config.progress_log())?;
//!
//!     let mut orchestrator = Orchestrator::new(job, log);
//!     let stats = orchestrator
//!         .run_from_file(&config.keyword_list(), IndexWindow::default(), |_| {})
//!         .await;
//!     println!("{} keywords done", stats.keywords_processed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod keywords;
pub mod pipeline;
pub mod progress;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, HarvestError, PipelineError, PipelineResult, Result};
pub use pipeline::{
    address_for, AcquisitionStage, BingSource, ImageSource, KeywordJob, Normalizer, Orchestrator,
    Sweep, SweepMode,
};
pub use progress::ProgressLog;
pub use types::{
    ContentKey, IndexWindow, JobState, Keyword, KeywordReport, NormalizeSummary, Outcome,
    QuarantineReason, RunStatistics, WorkerConfig,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
