//! Sub-configuration structs and their defaults.

use image::imageops::FilterType;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where keywords come from and where artifacts and progress go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one work directory per keyword
    pub root: PathBuf,

    /// Newline-delimited keyword list
    pub keyword_list: PathBuf,

    /// Append-only progress log
    pub progress_log: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./Images"),
            keyword_list: PathBuf::from("./keywords.txt"),
            progress_log: PathBuf::from("./progress.txt"),
        }
    }
}

/// Canonical encoding every kept artifact is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalFormat {
    #[default]
    Jpeg,
    Png,
}

impl CanonicalFormat {
    /// File extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            CanonicalFormat::Jpeg => "jpg",
            CanonicalFormat::Png => "png",
        }
    }

    /// Whether `ext` (case-insensitive, without the dot) already names this format.
    pub fn matches_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            CanonicalFormat::Jpeg => ext == "jpg" || ext == "jpeg",
            CanonicalFormat::Png => ext == "png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            CanonicalFormat::Jpeg => ImageFormat::Jpeg,
            CanonicalFormat::Png => ImageFormat::Png,
        }
    }
}

/// Interpolation used when an artifact has to be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    /// Bicubic
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Target shape and encoding of normalized artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Target width in pixels
    pub width: u32,

    /// Target height in pixels
    pub height: u32,

    /// Canonical output format
    pub format: CanonicalFormat,

    /// JPEG quality (1-100), ignored for PNG
    pub quality: u8,

    /// Resize interpolation
    pub filter: ResizeFilter,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            format: CanonicalFormat::Jpeg,
            quality: 90,
            filter: ResizeFilter::CatmullRom,
        }
    }
}

/// Crawler settings: worker pools, queues, HTTP behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Discovery workers (result-page feeders)
    pub feeder_threads: usize,

    /// Extraction workers (result-page parsers)
    pub parser_threads: usize,

    /// Download workers
    pub downloader_threads: usize,

    /// Target number of artifacts per keyword
    pub max_num_images: usize,

    /// Max references buffered between crawl stages
    pub queue_size: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Wall-clock ceiling for one keyword's acquisition
    pub keyword_timeout_ms: u64,

    /// Retries for transient download failures
    pub retry_attempts: u32,

    /// Base backoff delay in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            feeder_threads: 2,
            parser_threads: 4,
            downloader_threads: 8,
            max_num_images: 200,
            queue_size: 100,
            user_agent: concat!("imgrake/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_ms: 15_000,
            keyword_timeout_ms: 600_000,
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

/// Resource limits to protect against problematic downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum artifact size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum decoded dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
        }
    }
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Artifacts normalized concurrently within one work directory
    pub parallel_workers: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
