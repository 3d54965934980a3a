//! The fetch collaborator interface and the destination it writes into.
//!
//! An [`ImageSource`] knows how to find result pages for a keyword, how to
//! pull image URLs out of a page, and how to download one image. The
//! acquisition stage owns the worker pools that drive it.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{PipelineError, PipelineResult};
use crate::types::Keyword;

/// Name of the per-directory record holding the keyword text.
pub const INFO_FILE: &str = "info";

/// A result page to be parsed for image URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub url: String,
    /// Position of the page's first result in the source's ranking
    pub offset: usize,
}

/// A direct image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
}

/// Which slice of the discovery space one discovery worker covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub count: usize,
}

/// Trait that all fetch collaborators implement.
///
/// Uses `async_trait` because the acquisition stage shares one
/// `Arc<dyn ImageSource>` between all of its workers.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Source name for logging (e.g., "bing").
    fn name(&self) -> &str;

    /// Stream page references for `keyword`, restricted to `shard`.
    ///
    /// `target` is the number of artifacts the caller wants; sources use it
    /// to bound how far they page.
    fn discover(
        &self,
        keyword: &Keyword,
        shard: Shard,
        target: usize,
    ) -> BoxStream<'static, PipelineResult<PageRef>>;

    /// Extract direct image URLs from one result page.
    async fn extract(&self, page: &PageRef) -> PipelineResult<Vec<ImageRef>>;

    /// Download one image into `destination`, returning the written path.
    async fn download(
        &self,
        image: &ImageRef,
        destination: &Destination,
    ) -> PipelineResult<PathBuf>;
}

/// A writable work directory that hands out unique sequential artifact names.
///
/// Numbering continues after the highest numbered file already present, so
/// revisiting a populated directory adds artifacts instead of overwriting them.
#[derive(Debug)]
pub struct Destination {
    dir: PathBuf,
    next: AtomicUsize,
}

impl Destination {
    /// Open `dir` for writing.
    ///
    /// Fails if the path is not a directory or a scratch file cannot be created in it.
    pub fn open(dir: &Path) -> PipelineResult<Self> {
        let meta = std::fs::metadata(dir).map_err(|e| PipelineError::Destination {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(PipelineError::Destination {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        // Dropping the scratch file removes it
        tempfile::Builder::new()
            .prefix(".writable")
            .tempfile_in(dir)
            .map_err(|e| PipelineError::Destination {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;

        let highest = highest_index(dir).map_err(|e| PipelineError::io(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next: AtomicUsize::new(highest + 1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a fresh file path with the given extension (without the dot).
    pub fn allocate(&self, extension: &str) -> PathBuf {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("{index:06}.{extension}"))
    }
}

/// Highest numeric file stem in `dir`, or 0.
fn highest_index(dir: &Path) -> std::io::Result<usize> {
    let mut highest = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(stem) = Path::new(&name).file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(index) = stem.parse::<usize>() {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}
