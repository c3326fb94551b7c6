//! `imagepipe config`: inspect, create and check the TOML config file.

use anyhow::Context;
use clap::{Args, Subcommand};
use imagepipe_core::Config;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show {
        /// Read this file instead of the standard location
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print where the config file is looked up
    Path,

    /// Write a config file with every default filled in
    Init {
        /// Target file (defaults to the standard location)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Replace a file that already exists
        #[arg(long)]
        force: bool,
    },

    /// Parse and validate a config file without running anything
    Check {
        /// File to check (defaults to the standard location)
        file: Option<PathBuf>,
    },
}

pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { file } => {
            let (source, config) = effective(file)?;
            println!("# {source}");
            print!("{}", config.to_toml()?);
        }
        ConfigCommand::Path => println!("{}", Config::default_path().display()),
        ConfigCommand::Init { file, force } => {
            let path = file.unwrap_or_else(Config::default_path);
            write_defaults(&path, force)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Check { file } => {
            let path = file.unwrap_or_else(Config::default_path);
            let config = Config::load_from(&path)
                .with_context(|| format!("{} is not a usable config", path.display()))?;
            println!(
                "{}: ok ({} worker(s), sprite selector '{}')",
                path.display(),
                config.processing.parallel_workers,
                config.sprite.selector
            );
        }
    }
    Ok(())
}

/// The configuration a run would use, plus a note on where it came from.
fn effective(file: Option<PathBuf>) -> anyhow::Result<(String, Config)> {
    let path = file.unwrap_or_else(Config::default_path);
    if path.exists() {
        let config = Config::load_from(&path)?;
        Ok((format!("from {}", path.display()), config))
    } else {
        Ok((
            format!("built-in defaults ({} not found)", path.display()),
            Config::default(),
        ))
    }
}

fn write_defaults(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to replace it", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    tracing::info!("Default config written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_defaults_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_defaults(&path, false).unwrap();
        assert!(Config::load_from(&path).is_ok());

        assert!(write_defaults(&path, false).is_err());
        write_defaults(&path, true).unwrap();
    }

    #[test]
    fn test_effective_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (source, config) = effective(Some(dir.path().join("missing.toml"))).unwrap();
        assert!(source.starts_with("built-in defaults"));
        assert_eq!(config.processing.parallel_workers, 1);
    }

    #[test]
    fn test_effective_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[processing]\nparallel_workers = 3\n").unwrap();

        let (source, config) = effective(Some(path)).unwrap();
        assert!(source.starts_with("from "));
        assert_eq!(config.processing.parallel_workers, 3);
    }
}
