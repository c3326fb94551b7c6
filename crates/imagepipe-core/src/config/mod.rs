//! Configuration management for imagepipe.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a missing file or a
//! partially filled one both work.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for imagepipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Processing settings
    pub processing: ProcessingConfig,

    /// Backend call limits
    pub limits: LimitsConfig,

    /// Temporary generation storage
    pub temp: TempConfig,

    /// Sprite sheet defaults
    pub sprite: SpriteConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.imagepipe.imagepipe/config.toml
    /// - Linux: ~/.config/imagepipe/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\imagepipe\config\config.toml
    ///
    /// Falls back to ~/.imagepipe/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "imagepipe", "imagepipe")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".imagepipe").join("config.toml")
            })
    }

    /// Get the resolved parent directory for stage directories (with ~ expansion).
    pub fn temp_dir(&self) -> Option<PathBuf> {
        self.temp.dir.as_ref().map(|dir| {
            let path_str = dir.to_string_lossy();
            PathBuf::from(shellexpand::tilde(&path_str).into_owned())
        })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SpriteLayout;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.general.verbose);
        assert_eq!(config.processing.parallel_workers, 1);
        assert_eq!(config.limits.transform_timeout_ms, 0);
        assert_eq!(config.temp.prefix, "imagepipe");
        assert_eq!(config.sprite.selector, "img.");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[processing]"));
        assert!(toml.contains("[sprite]"));
        assert!(!toml.contains("dir ="));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[processing]\nparallel_workers = 3\n\n[sprite]\nlayout = \"vertical\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.processing.parallel_workers, 3);
        assert_eq!(config.sprite.layout, SpriteLayout::Vertical);
        assert_eq!(config.sprite.selector, "img.");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[processing]\nparallel_workers = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_temp_dir_expands_tilde() {
        let mut config = Config::default();
        assert!(config.temp_dir().is_none());

        config.temp.dir = Some(PathBuf::from("~/scratch"));
        let resolved = config.temp_dir().unwrap();
        assert!(resolved.ends_with("scratch"));
        if std::env::var_os("HOME").is_some() {
            assert!(!resolved.to_string_lossy().starts_with('~'));
        }
    }
}
