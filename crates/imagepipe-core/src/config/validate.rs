//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest accepted sprite padding, in pixels.
const MAX_SPRITE_PADDING: u32 = 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.temp.prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "temp.prefix must not be empty".into(),
            ));
        }
        if self.temp.prefix.contains(std::path::is_separator) {
            return Err(ConfigError::ValidationError(
                "temp.prefix must not contain path separators".into(),
            ));
        }
        if self.sprite.padding > MAX_SPRITE_PADDING {
            return Err(ConfigError::ValidationError(format!(
                "sprite.padding must be <= {MAX_SPRITE_PADDING}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }

    #[test]
    fn test_validate_rejects_bad_temp_prefix() {
        let mut config = Config::default();
        config.temp.prefix = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temp.prefix"));

        config.temp.prefix = "a/b".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("separators"));
    }

    #[test]
    fn test_validate_rejects_huge_padding() {
        let mut config = Config::default();
        config.sprite.padding = 5000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sprite.padding"));
    }
}
