//! Bing image search as a fetch collaborator.
//!
//! Discovery pages through the `images/async` endpoint, extraction pulls the
//! `murl` (media URL) fields out of each result page, and downloads are
//! streamed to disk with a size cap.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

use super::retry;
use super::sniff::{extension_for_content_type, sniff_extension};
use super::source::{Destination, ImageRef, ImageSource, PageRef, Shard};
use crate::config::{CrawlConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::Keyword;

const SEARCH_ENDPOINT: &str = "https://www.bing.com/images/async";

/// Results per page requested from the endpoint.
pub const PAGE_SIZE: usize = 35;

/// Bing stops returning new results past this offset.
const MAX_OFFSET: usize = 1000;

/// Media URL field, either HTML-escaped inside an attribute or plain JSON.
const MURL_PATTERN: &str = r#"murl&quot;:&quot;(.*?)&quot;|"murl":"(.*?)""#;

/// Fetch collaborator backed by Bing image search.
pub struct BingSource {
    client: reqwest::Client,
    murl: Regex,
    request_timeout: Duration,
    retry_attempts: u32,
    retry_delay_ms: u64,
    max_bytes: u64,
}

impl BingSource {
    pub fn new(crawl: &CrawlConfig, limits: &LimitsConfig) -> PipelineResult<Self> {
        let request_timeout = Duration::from_millis(crawl.request_timeout_ms);
        let client = reqwest::Client::builder()
            .user_agent(crawl.user_agent.clone())
            .timeout(request_timeout)
            .build()
            .map_err(|e| PipelineError::Stage {
                stage: "acquire".to_string(),
                message: format!("Cannot build HTTP client: {e}"),
            })?;
        let murl = Regex::new(MURL_PATTERN).map_err(|e| PipelineError::Stage {
            stage: "acquire".to_string(),
            message: format!("Invalid media URL pattern: {e}"),
        })?;

        Ok(Self {
            client,
            murl,
            request_timeout,
            retry_attempts: crawl.retry_attempts,
            retry_delay_ms: crawl.retry_delay_ms,
            max_bytes: limits.max_file_size_mb.saturating_mul(1024 * 1024),
        })
    }

    /// Result-page offsets covered by one discovery shard.
    ///
    /// Pages are dealt round-robin across shards. Twice the target is paged
    /// through since a good share of candidates fail to download.
    pub fn shard_offsets(shard: Shard, target: usize) -> Vec<usize> {
        let limit = target.saturating_mul(2).clamp(PAGE_SIZE, MAX_OFFSET);
        let count = shard.count.max(1);
        (0..)
            .map(|page| page * PAGE_SIZE)
            .take_while(|offset| *offset < limit)
            .enumerate()
            .filter(|(page, _)| page % count == shard.index)
            .map(|(_, offset)| offset)
            .collect()
    }

    /// Pull unique image URLs out of a result page body.
    pub fn parse_page(&self, body: &str) -> Vec<ImageRef> {
        let mut seen = std::collections::HashSet::new();
        self.murl
            .captures_iter(body)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| unescape(m.as_str()))
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
            .filter(|url| seen.insert(url.clone()))
            .map(|url| ImageRef { url })
            .collect()
    }

    async fn download_once(
        &self,
        image: &ImageRef,
        destination: &Destination,
    ) -> PipelineResult<PathBuf> {
        let download_err = |status_code: Option<u16>, message: String| PipelineError::Download {
            url: image.url.clone(),
            status_code,
            message,
        };

        let resp = self.client.get(&image.url).send().await.map_err(|e| {
            if e.is_timeout() {
                PipelineError::Timeout {
                    target: image.url.clone(),
                    stage: "download".to_string(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                download_err(None, e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(download_err(Some(status.as_u16()), format!("HTTP {status}")));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = &content_type {
            if !ct.to_ascii_lowercase().starts_with("image/") {
                return Err(download_err(None, format!("content type {ct} is not an image")));
            }
        }
        if resp.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(download_err(None, "body exceeds size limit".to_string()));
        }

        let mut body = Vec::new();
        let mut chunks = resp.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| download_err(None, e.to_string()))?;
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(download_err(None, "body exceeds size limit".to_string()));
            }
        }
        if body.is_empty() {
            return Err(download_err(None, "empty body".to_string()));
        }

        let extension = sniff_extension(&body)
            .or_else(|| content_type.as_deref().and_then(extension_for_content_type))
            .ok_or_else(|| download_err(None, "body is not an image".to_string()))?;

        let path = destination.allocate(extension);
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| PipelineError::io(&path, e))?;
        Ok(path)
    }
}

#[async_trait]
impl ImageSource for BingSource {
    fn name(&self) -> &str {
        "bing"
    }

    fn discover(
        &self,
        keyword: &Keyword,
        shard: Shard,
        target: usize,
    ) -> BoxStream<'static, PipelineResult<PageRef>> {
        let query = keyword.as_str().to_string();
        let pages: Vec<PipelineResult<PageRef>> = Self::shard_offsets(shard, target)
            .into_iter()
            .map(|offset| {
                let first = offset.to_string();
                let count = PAGE_SIZE.to_string();
                reqwest::Url::parse_with_params(
                    SEARCH_ENDPOINT,
                    &[
                        ("q", query.as_str()),
                        ("first", first.as_str()),
                        ("count", count.as_str()),
                        ("adlt", "off"),
                    ],
                )
                .map(|url| PageRef {
                    url: url.to_string(),
                    offset,
                })
                .map_err(|e| PipelineError::Fetch {
                    url: SEARCH_ENDPOINT.to_string(),
                    status_code: None,
                    message: e.to_string(),
                })
            })
            .collect();
        stream::iter(pages).boxed()
    }

    async fn extract(&self, page: &PageRef) -> PipelineResult<Vec<ImageRef>> {
        let fetch_err = |status_code: Option<u16>, message: String| PipelineError::Fetch {
            url: page.url.clone(),
            status_code,
            message,
        };

        let resp = self
            .client
            .get(&page.url)
            .send()
            .await
            .map_err(|e| fetch_err(None, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(Some(status.as_u16()), format!("HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| fetch_err(None, e.to_string()))?;

        let images = self.parse_page(&body);
        tracing::trace!("Page at offset {} yielded {} URLs", page.offset, images.len());
        Ok(images)
    }

    async fn download(
        &self,
        image: &ImageRef,
        destination: &Destination,
    ) -> PipelineResult<PathBuf> {
        let mut last_error = None;
        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.retry_delay_ms);
                tracing::debug!(
                    "Retry {attempt}/{} for {} after {delay:?}",
                    self.retry_attempts,
                    image.url
                );
                tokio::time::sleep(delay).await;
            }

            match self.download_once(image, destination).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let retryable = retry::is_retryable(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| PipelineError::Download {
            url: image.url.clone(),
            status_code: None,
            message: "no attempts made".to_string(),
        }))
    }
}

/// Undo the HTML entity escaping Bing applies inside attribute values.
fn unescape(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("\\/", "/")
        .replace("&quot;", "\"")
}
