//! Keyword to directory-name mapping.

use blake3::Hasher as Blake3Hasher;
use std::path::{Path, PathBuf};

use crate::types::{ContentKey, Keyword};

/// Length of every [`ContentKey`] in hex characters.
pub const CONTENT_KEY_LEN: usize = 64;

/// Derive the content key for a keyword: BLAKE3 of its UTF-8 bytes, lowercase hex.
///
/// Pure and total. The same keyword text always maps to the same key, across
/// processes and machines, so a restarted run finds its earlier directories.
pub fn address_for(keyword: &Keyword) -> ContentKey {
    let mut hasher = Blake3Hasher::new();
    hasher.update(keyword.as_str().as_bytes());
    ContentKey::from_hex(hasher.finalize().to_hex().to_string())
}

/// Work directory for a keyword under `root`.
pub fn work_dir(root: &Path, keyword: &Keyword) -> PathBuf {
    root.join(address_for(keyword).as_str())
}
