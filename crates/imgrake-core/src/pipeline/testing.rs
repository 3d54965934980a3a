//! Test doubles: an in-memory image source and generated image fixtures.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::source::{Destination, ImageRef, ImageSource, PageRef, Shard};
use crate::error::{PipelineError, PipelineResult};
use crate::types::Keyword;

/// What a fake download produces.
#[derive(Debug, Clone, Copy)]
pub enum Payload {
    /// Opaque RGB PNG
    Png(u32, u32),
    /// PNG with an alpha channel
    RgbaPng(u32, u32),
    /// Baseline JPEG
    Jpeg(u32, u32),
    /// Random bytes behind a PNG extension
    Corrupt,
    /// Download failure
    Unreachable,
}

impl Payload {
    fn render(self) -> Option<(Vec<u8>, &'static str)> {
        match self {
            Payload::Png(w, h) => Some((encode(&rgb(w, h), ImageFormat::Png), "png")),
            Payload::RgbaPng(w, h) => Some((encode(&rgba(w, h), ImageFormat::Png), "png")),
            Payload::Jpeg(w, h) => Some((encode(&rgb(w, h), ImageFormat::Jpeg), "jpg")),
            Payload::Corrupt => Some((b"\x89PNG\r\n\x1a\nthis is not a png".to_vec(), "png")),
            Payload::Unreachable => None,
        }
    }
}

/// In-memory fetch collaborator with a fixed plan per keyword.
#[derive(Default)]
pub struct FakeSource {
    plans: HashMap<String, Vec<Payload>>,
    hanging: HashSet<String>,
    discovered: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, keyword: &str, payloads: Vec<Payload>) -> Self {
        self.plans.insert(keyword.to_string(), payloads);
        self
    }

    /// Discovery for `keyword` never completes.
    pub fn hanging(mut self, keyword: &str) -> Self {
        self.hanging.insert(keyword.to_string());
        self
    }

    /// Handle to the list of keywords discovery was asked about.
    pub fn discovered(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.discovered)
    }
}

#[async_trait]
impl ImageSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn discover(
        &self,
        keyword: &Keyword,
        shard: Shard,
        _target: usize,
    ) -> BoxStream<'static, PipelineResult<PageRef>> {
        if shard.index == 0 {
            self.discovered
                .lock()
                .unwrap()
                .push(keyword.as_str().to_string());
        }
        if self.hanging.contains(keyword.as_str()) {
            return stream::pending().boxed();
        }
        if shard.index != 0 || !self.plans.contains_key(keyword.as_str()) {
            return stream::empty().boxed();
        }
        let page = PageRef {
            url: keyword.as_str().to_string(),
            offset: 0,
        };
        stream::iter(vec![Ok(page)]).boxed()
    }

    async fn extract(&self, page: &PageRef) -> PipelineResult<Vec<ImageRef>> {
        let count = self.plans.get(&page.url).map(Vec::len).unwrap_or(0);
        Ok((0..count)
            .map(|i| ImageRef {
                url: format!("{}#{i}", page.url),
            })
            .collect())
    }

    async fn download(
        &self,
        image: &ImageRef,
        destination: &Destination,
    ) -> PipelineResult<PathBuf> {
        let unreachable = || PipelineError::Download {
            url: image.url.clone(),
            status_code: Some(404),
            message: "HTTP 404".to_string(),
        };
        let (keyword, index) = image.url.rsplit_once('#').ok_or_else(unreachable)?;
        let index: usize = index.parse().map_err(|_| unreachable())?;
        let payload = self
            .plans
            .get(keyword)
            .and_then(|plan| plan.get(index))
            .copied()
            .ok_or_else(unreachable)?;
        let (bytes, ext) = payload.render().ok_or_else(unreachable)?;

        let path = destination.allocate(ext);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;
        Ok(path)
    }
}

pub fn rgb(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 7) as u8, (y * 13) as u8, 128])
    }))
}

pub fn rgba(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
        Rgba([(x * 3) as u8, (y * 5) as u8, 200, 100])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn write_image(path: &Path, image: &DynamicImage, format: ImageFormat) {
    std::fs::write(path, encode(image, format)).unwrap();
}

/// Files in `dir` other than the keyword record, sorted.
pub fn artifact_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != super::source::INFO_FILE)
        .collect();
    names.sort();
    names
}
