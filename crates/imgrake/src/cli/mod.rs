//! Command implementations.

pub mod config;
pub mod crawl;
pub mod normalize;
pub mod prune;
pub mod summary;

use imgrake_core::Config;
use std::path::{Path, PathBuf};

/// Load from `path` when given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(&expand_path(path))?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Expand a leading `~` in a path given on the command line.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
