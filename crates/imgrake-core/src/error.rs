//! Error types for the imgrake acquisition pipeline.
//!
//! Errors are organized by stage to provide clear, actionable error messages
//! that include relevant context (file paths, URLs, stage names).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for imgrake operations.
///
/// Only these errors abort a whole run. Everything scoped to one keyword or
/// one artifact is reported through [`PipelineError`] and handled locally.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// The keyword list could not be read
    #[error("Cannot read keyword list {path}: {source}")]
    KeywordList {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The storage root could not be created
    #[error("Cannot create storage root {path}: {source}")]
    StorageRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Color conversion, resize or re-encode failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {target} after {timeout_ms}ms")]
    Timeout {
        target: String,
        stage: String,
        timeout_ms: u64,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// A discovery or extraction request failed
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status_code: Option<u16>,
        message: String,
    },

    /// A candidate image could not be downloaded or written
    #[error("Download failed for {url}: {message}")]
    Download {
        url: String,
        status_code: Option<u16>,
        message: String,
    },

    /// The destination directory cannot receive artifacts
    #[error("Destination {path} is not writable: {message}")]
    Destination { path: PathBuf, message: String },

    /// A stage could not start its workers
    #[error("{stage} stage cannot start: {message}")]
    Stage { stage: String, message: String },

    /// Filesystem error with path context
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for imgrake results.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
