//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive_counts = [
            ("crawl.feeder_threads", self.crawl.feeder_threads),
            ("crawl.parser_threads", self.crawl.parser_threads),
            ("crawl.downloader_threads", self.crawl.downloader_threads),
            ("crawl.queue_size", self.crawl.queue_size),
            ("normalize.parallel_workers", self.normalize.parallel_workers),
        ];
        for (key, value) in positive_counts {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{key} must be > 0")));
            }
        }

        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::ValidationError(
                "image.width and image.height must be > 0".into(),
            ));
        }
        if self.image.quality == 0 || self.image.quality > 100 {
            return Err(ConfigError::ValidationError(
                "image.quality must be between 1 and 100".into(),
            ));
        }
        if self.crawl.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "crawl.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.crawl.keyword_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "crawl.keyword_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        // Canonical output has to pass the decode guard on the next sweep.
        let largest = self.image.width.max(self.image.height);
        if largest > self.limits.max_image_dimension {
            return Err(ConfigError::ValidationError(format!(
                "image.width and image.height must not exceed limits.max_image_dimension ({} > {})",
                largest, self.limits.max_image_dimension
            )));
        }
        Ok(())
    }
}
