//! Keyword list loading.

use std::path::Path;

use crate::error::{HarvestError, Result};
use crate::types::Keyword;

/// Read a newline-delimited UTF-8 keyword list.
///
/// Every line becomes one keyword, blank lines included, so that a keyword's
/// index always equals its line number and resume indices stay stable when
/// the list is edited only by appending.
pub fn load(path: &Path) -> Result<Vec<Keyword>> {
    let content = std::fs::read_to_string(path).map_err(|source| HarvestError::KeywordList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(&content))
}

/// Split list contents into keywords. Handles `\n` and `\r\n` line endings.
pub fn parse(content: &str) -> Vec<Keyword> {
    content.lines().map(Keyword::new).collect()
}
