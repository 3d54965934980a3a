//! Retry policy for transient fetch failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::PipelineError;
use std::time::Duration;

/// Determine whether a fetch error is worth retrying.
///
/// Retryable errors: timeouts, rate limits (429), server errors (5xx),
/// connection failures. Non-retryable: 4xx, non-image bodies, disk errors.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Fetch {
            status_code,
            message,
            ..
        }
        | PipelineError::Download {
            status_code,
            message,
            ..
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn download_err(status_code: Option<u16>, message: &str) -> PipelineError {
        PipelineError::Download {
            url: "https://example.com/a.jpg".to_string(),
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            target: "https://example.com/a.jpg".to_string(),
            stage: "download".to_string(),
            timeout_ms: 15000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        assert!(is_retryable(&download_err(Some(429), "HTTP 429")));
    }

    #[test]
    fn test_server_error_is_retryable() {
        assert!(is_retryable(&download_err(Some(503), "HTTP 503")));
    }

    #[test]
    fn test_not_found_not_retryable() {
        assert!(!is_retryable(&download_err(Some(404), "HTTP 404")));
    }

    #[test]
    fn test_connection_error_retryable_without_status() {
        assert!(is_retryable(&download_err(None, "error trying to connect")));
    }

    #[test]
    fn test_not_an_image_not_retryable() {
        assert!(!is_retryable(&download_err(None, "body is not an image")));
    }

    #[test]
    fn test_io_error_not_retryable() {
        let err = PipelineError::io(
            PathBuf::from("/full/disk"),
            std::io::Error::new(std::io::ErrorKind::Other, "no space"),
        );
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_capped_at_30s() {
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }
}
