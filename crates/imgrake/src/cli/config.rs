//! The `imgrake config` command for configuration management.

use clap::{Args, Subcommand};
use imgrake_core::Config;
use std::path::{Path, PathBuf};

use super::{expand_path, load_config};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// The config file in effect: `--config` when given, else the default location.
fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(Config::default_path, expand_path)
}

/// Write a default config file at `path`.
fn init_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = Config::default().to_toml()?;
    std::fs::write(path, toml)?;
    Ok(())
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, explicit: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = load_config(explicit)?;
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", config_path(explicit).display());
        }

        ConfigCommand::Init { force } => {
            let path = config_path(explicit);
            init_at(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init_at(&path, false).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.crawl.feeder_threads, 2);
        assert_eq!(loaded.image.width, 256);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[image]\nwidth = 64\n").unwrap();

        let err = init_at(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[image]\nwidth = 64\n"
        );

        init_at(&path, true).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().image.width, 256);
    }

    #[test]
    fn test_explicit_path_wins() {
        let explicit = Path::new("/etc/imgrake.toml");
        assert_eq!(config_path(Some(explicit)), PathBuf::from("/etc/imgrake.toml"));
        assert_eq!(config_path(None), Config::default_path());
    }
}
