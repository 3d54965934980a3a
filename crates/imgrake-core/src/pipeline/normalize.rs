//! Normalization: turn untrusted artifacts into canonical images or delete them.
//!
//! Every artifact is decoded, flattened to three-channel RGB, resized to the
//! target dimensions when they differ, and re-encoded in the canonical format.
//! Any failure along the way quarantines the artifact: the file is deleted and
//! the reason is logged. A file that is already canonical is left untouched.

use image::{ColorType, DynamicImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::decode::{DecodedImage, ImageDecoder};
use super::source::INFO_FILE;
use crate::config::{CanonicalFormat, Config, ImageConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{NormalizeSummary, Outcome, QuarantineReason};

/// Name prefix of the temporary file a rewrite is staged in.
const STAGING_PREFIX: &str = ".normalize";

#[derive(Debug, Clone, Copy)]
enum Mode {
    Normalize,
    Validate,
}

/// Validates and rewrites artifacts into the canonical shape.
#[derive(Debug, Clone)]
pub struct Normalizer {
    decoder: ImageDecoder,
    image: ImageConfig,
}

impl Normalizer {
    pub fn new(image: ImageConfig, limits: LimitsConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits),
            image,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.image.clone(), config.limits.clone())
    }

    /// Same settings with a different target size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.image.width = width;
        self.image.height = height;
        self
    }

    pub fn target(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    /// Normalize one artifact in place.
    ///
    /// On `Kept` the canonical file is at the returned path, which differs from
    /// `path` when the extension had to change. On `Quarantined` nothing is
    /// left at either location.
    pub async fn normalize(&self, path: &Path) -> Outcome {
        let decoded = match self.decoder.decode(path).await {
            Ok(decoded) => decoded,
            Err(e) => return quarantine(path, None, reason_for(&e)).await,
        };

        let format = self.image.format;
        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| format.matches_extension(ext));
        if extension_ok && self.is_canonical(&decoded) {
            tracing::trace!("Already canonical: {:?}", path);
            return Outcome::Kept {
                path: path.to_path_buf(),
                rewritten: false,
            };
        }

        let target = if extension_ok {
            path.to_path_buf()
        } else {
            path.with_extension(format.extension())
        };
        let image = self.image.clone();
        let write_target = target.clone();
        let written = tokio::task::spawn_blocking(move || {
            rewrite(decoded.image, &image, &write_target)
        })
        .await
        .unwrap_or_else(|e| {
            Err(PipelineError::Encode {
                path: target.clone(),
                message: format!("Task join error: {e}"),
            })
        });

        if let Err(e) = written {
            return quarantine(path, Some(&target), reason_for(&e)).await;
        }
        if target != path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!("Cannot remove replaced artifact {:?}: {e}", path);
            }
        }
        Outcome::Kept {
            path: target,
            rewritten: true,
        }
    }

    /// Decode-only check. Valid artifacts are left as they are.
    pub async fn validate(&self, path: &Path) -> Outcome {
        match self.decoder.decode(path).await {
            Ok(_) => Outcome::Kept {
                path: path.to_path_buf(),
                rewritten: false,
            },
            Err(e) => quarantine(path, None, reason_for(&e)).await,
        }
    }

    /// Normalize every artifact in `dir`, at most `parallel` at a time.
    pub async fn normalize_dir(&self, dir: &Path, parallel: usize) -> PipelineResult<NormalizeSummary> {
        self.sweep_dir(dir, parallel, Mode::Normalize).await
    }

    /// Delete every artifact in `dir` that does not decode.
    pub async fn prune_dir(&self, dir: &Path, parallel: usize) -> PipelineResult<NormalizeSummary> {
        self.sweep_dir(dir, parallel, Mode::Validate).await
    }

    async fn sweep_dir(
        &self,
        dir: &Path,
        parallel: usize,
        mode: Mode,
    ) -> PipelineResult<NormalizeSummary> {
        clear_staging(dir)?;
        let artifacts = list_artifacts(dir)?;
        let semaphore = Arc::new(Semaphore::new(parallel.max(1)));
        let mut handles = Vec::with_capacity(artifacts.len());

        for path in artifacts {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                tracing::warn!("Normalization semaphore closed unexpectedly, stopping sweep");
                break;
            };
            let normalizer = self.clone();
            handles.push(tokio::spawn(async move {
                let outcome = match mode {
                    Mode::Normalize => normalizer.normalize(&path).await,
                    Mode::Validate => normalizer.validate(&path).await,
                };
                drop(permit);
                outcome
            }));
        }

        let mut summary = NormalizeSummary::default();
        for handle in handles {
            match handle.await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => tracing::error!("Normalization task panicked: {e}"),
            }
        }
        Ok(summary)
    }

    fn is_canonical(&self, decoded: &DecodedImage) -> bool {
        decoded.format == self.image.format.image_format()
            && decoded.image.color() == ColorType::Rgb8
            && decoded.width == self.image.width
            && decoded.height == self.image.height
    }
}

/// Artifact files in a work directory: everything except the keyword record,
/// hidden files and subdirectories. Sorted by name.
pub fn list_artifacts(dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == INFO_FILE || name.starts_with('.') {
            continue;
        }
        let is_file = entry
            .file_type()
            .map_err(|e| PipelineError::io(entry.path(), e))?
            .is_file();
        if is_file {
            artifacts.push(entry.path());
        }
    }
    artifacts.sort();
    Ok(artifacts)
}

/// Remove staging files an interrupted rewrite left behind.
fn clear_staging(dir: &Path) -> PipelineResult<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))? {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot remove stale staging file {:?}: {e}", entry.path()),
        }
    }
    if removed > 0 {
        tracing::debug!("Removed {} stale staging file(s) in {:?}", removed, dir);
    }
    Ok(removed)
}

/// Flatten, resize and encode, then atomically replace `target`.
fn rewrite(image: DynamicImage, config: &ImageConfig, target: &Path) -> PipelineResult<()> {
    let encode_err = |message: String| PipelineError::Encode {
        path: target.to_path_buf(),
        message,
    };

    let mut rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    if rgb.width() != config.width || rgb.height() != config.height {
        rgb = rgb.resize_exact(config.width, config.height, config.filter.filter_type());
    }

    let mut buffer = Cursor::new(Vec::new());
    match config.format {
        CanonicalFormat::Jpeg => {
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, config.quality);
            rgb.write_with_encoder(encoder)
        }
        CanonicalFormat::Png => rgb.write_to(&mut buffer, config.format.image_format()),
    }
    .map_err(|e| encode_err(e.to_string()))?;

    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| encode_err(format!("Cannot stage output: {e}")))?;
    staged
        .write_all(buffer.get_ref())
        .map_err(|e| encode_err(format!("Cannot write output: {e}")))?;
    staged
        .persist(target)
        .map_err(|e| encode_err(format!("Cannot replace artifact: {}", e.error)))?;
    Ok(())
}

fn reason_for(error: &PipelineError) -> QuarantineReason {
    let message = error.to_string();
    match error {
        PipelineError::FileTooLarge { .. } | PipelineError::ImageTooLarge { .. } => {
            QuarantineReason::TooLarge(message)
        }
        PipelineError::Timeout { .. } => QuarantineReason::Timeout(message),
        PipelineError::Encode { .. } => QuarantineReason::Encode(message),
        _ => QuarantineReason::Decode(message),
    }
}

/// Delete the artifact and any partial output, then report the reason.
async fn quarantine(path: &Path, partial: Option<&Path>, reason: QuarantineReason) -> Outcome {
    for victim in std::iter::once(path).chain(partial.filter(|p| *p != path)) {
        match tokio::fs::remove_file(victim).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot delete quarantined artifact {:?}: {e}", victim),
        }
    }
    tracing::warn!("Quarantined {:?}: {}", path, reason);
    Outcome::Quarantined(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{rgb, rgba, write_image};
    use image::{GenericImageView, ImageFormat};

    fn normalizer(width: u32, height: u32) -> Normalizer {
        Normalizer::new(ImageConfig::default(), LimitsConfig::default()).with_size(width, height)
    }

    #[tokio::test]
    async fn test_canonical_artifact_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.jpg");
        write_image(&path, &rgb(16, 16), ImageFormat::Jpeg);
        let before = std::fs::read(&path).unwrap();

        let outcome = normalizer(16, 16).normalize(&path).await;

        assert_eq!(
            outcome,
            Outcome::Kept {
                path: path.clone(),
                rewritten: false
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_normalize_twice_second_pass_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.jpg");
        write_image(&path, &rgb(30, 20), ImageFormat::Jpeg);
        let n = normalizer(16, 16);

        let first = n.normalize(&path).await;
        assert!(matches!(first, Outcome::Kept { rewritten: true, .. }));
        let after_first = std::fs::read(&path).unwrap();

        let second = n.normalize(&path).await;
        assert!(matches!(second, Outcome::Kept { rewritten: false, .. }));
        assert_eq!(std::fs::read(&path).unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_undecodable_artifact_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\ntruncated").unwrap();

        let outcome = normalizer(16, 16).normalize(&path).await;

        assert!(matches!(
            outcome,
            Outcome::Quarantined(QuarantineReason::Decode(_))
        ));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_zero_length_artifact_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.jpg");
        std::fs::write(&path, b"").unwrap();

        let outcome = normalizer(16, 16).normalize(&path).await;

        assert!(matches!(
            outcome,
            Outcome::Quarantined(QuarantineReason::Decode(_))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_palette_image_becomes_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000002.gif");
        write_image(&path, &rgb(8, 8), ImageFormat::Gif);

        let outcome = normalizer(8, 8).normalize(&path).await;

        let expected = dir.path().join("000002.jpg");
        assert_eq!(
            outcome,
            Outcome::Kept {
                path: expected.clone(),
                rewritten: true
            }
        );
        assert!(!path.exists());
        let written = image::open(&expected).unwrap();
        assert_eq!(written.color(), ColorType::Rgb8);
        assert_eq!(written.dimensions(), (8, 8));
    }

    #[tokio::test]
    async fn test_alpha_png_becomes_rgb_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.png");
        write_image(&path, &rgba(10, 20), ImageFormat::Png);

        let outcome = normalizer(16, 16).normalize(&path).await;

        let expected = dir.path().join("000001.jpg");
        assert_eq!(
            outcome,
            Outcome::Kept {
                path: expected.clone(),
                rewritten: true
            }
        );
        assert!(!path.exists());
        let written = image::open(&expected).unwrap();
        assert_eq!(written.dimensions(), (16, 16));
        assert_eq!(written.color(), ColorType::Rgb8);
    }

    #[tokio::test]
    async fn test_matching_size_in_wrong_format_is_reencoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000003.jpg");
        // PNG bytes behind the canonical extension
        write_image(&path, &rgb(16, 16), ImageFormat::Png);

        let outcome = normalizer(16, 16).normalize(&path).await;

        assert!(matches!(outcome, Outcome::Kept { rewritten: true, .. }));
        let reader = image::ImageReader::open(&path)
            .unwrap()
            .with_guessed_format()
            .unwrap();
        assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
    }

    #[tokio::test]
    async fn test_png_canonical_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.png");
        write_image(&path, &rgb(8, 8), ImageFormat::Png);
        let config = ImageConfig {
            width: 8,
            height: 8,
            format: CanonicalFormat::Png,
            ..ImageConfig::default()
        };

        let outcome = Normalizer::new(config, LimitsConfig::default())
            .normalize(&path)
            .await;
        assert!(matches!(outcome, Outcome::Kept { rewritten: false, .. }));
    }

    #[tokio::test]
    async fn test_oversized_artifact_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000001.png");
        write_image(&path, &rgb(64, 8), ImageFormat::Png);
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        };

        let outcome = Normalizer::new(ImageConfig::default(), limits)
            .normalize(&path)
            .await;
        assert!(matches!(
            outcome,
            Outcome::Quarantined(QuarantineReason::TooLarge(_))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_normalize_dir_counts_and_skips_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INFO_FILE), "cat\n").unwrap();
        write_image(&dir.path().join("000001.jpg"), &rgb(16, 16), ImageFormat::Jpeg);
        write_image(&dir.path().join("000002.png"), &rgba(20, 12), ImageFormat::Png);
        std::fs::write(dir.path().join("000003.gif"), b"GIF89a nope").unwrap();

        let summary = normalizer(16, 16).normalize_dir(dir.path(), 2).await.unwrap();

        assert_eq!(
            summary,
            NormalizeSummary {
                kept: 2,
                rewritten: 1,
                quarantined: 1
            }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(INFO_FILE)).unwrap(),
            "cat\n"
        );
        assert_eq!(
            list_artifacts(dir.path()).unwrap(),
            vec![dir.path().join("000001.jpg"), dir.path().join("000002.jpg")]
        );
    }

    #[tokio::test]
    async fn test_prune_dir_only_removes_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        let valid = dir.path().join("000001.png");
        write_image(&valid, &rgba(20, 12), ImageFormat::Png);
        let before = std::fs::read(&valid).unwrap();
        std::fs::write(dir.path().join("000002.jpg"), b"not a jpeg").unwrap();

        let summary = normalizer(16, 16).prune_dir(dir.path(), 4).await.unwrap();

        assert_eq!(summary.kept, 1);
        assert_eq!(summary.quarantined, 1);
        assert_eq!(std::fs::read(&valid).unwrap(), before);
        assert_eq!(list_artifacts(dir.path()).unwrap(), vec![valid]);
    }

    #[tokio::test]
    async fn test_normalize_dir_removes_stale_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("000001.jpg"), &rgb(16, 16), ImageFormat::Jpeg);
        std::fs::write(dir.path().join(".normalizeA1b2C3"), b"half written").unwrap();
        std::fs::write(dir.path().join(".keep"), b"x").unwrap();

        let summary = normalizer(16, 16).normalize_dir(dir.path(), 2).await.unwrap();

        assert_eq!(summary.kept, 1);
        assert!(!dir.path().join(".normalizeA1b2C3").exists());
        assert!(dir.path().join(".keep").exists());
    }

    #[test]
    fn test_list_artifacts_skips_hidden_and_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden123"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("000002.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("000001.jpg"), b"x").unwrap();

        let names: Vec<_> = list_artifacts(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["000001.jpg", "000002.jpg"]);
    }
}
