//! Per-pipe options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{PipeError, PipeResult};

use super::names::NameMap;

/// Options carried by a pipe and inherited by every pipe derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeOptions {
    /// Report per-file progress while stages run
    pub verbose: bool,

    /// Files transformed concurrently within one stage (1 = sequential)
    pub parallel_workers: usize,

    /// Per-file transform timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_timeout_ms: Option<u64>,

    /// Unrecognised keys, preserved across stages
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,

    /// Original names of this generation's files; set only by stages
    #[serde(skip)]
    pub name_map: Option<Arc<NameMap>>,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            parallel_workers: 1,
            transform_timeout_ms: None,
            extra: BTreeMap::new(),
            name_map: None,
        }
    }
}

impl PipeOptions {
    /// Options derived from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            verbose: config.general.verbose,
            parallel_workers: config.processing.parallel_workers,
            transform_timeout_ms: match config.limits.transform_timeout_ms {
                0 => None,
                ms => Some(ms),
            },
            ..Self::default()
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers;
        self
    }

    pub fn transform_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.transform_timeout_ms = timeout_ms;
        self
    }

    /// Clone of these options with the name map replaced.
    pub(crate) fn with_name_map(&self, name_map: Option<Arc<NameMap>>) -> Self {
        Self {
            name_map,
            ..self.clone()
        }
    }

    pub(crate) fn validate(&self) -> PipeResult<()> {
        if self.parallel_workers == 0 {
            return Err(PipeError::InvalidConstruction(
                "parallel_workers must be > 0".into(),
            ));
        }
        if self.transform_timeout_ms == Some(0) {
            return Err(PipeError::InvalidConstruction(
                "transform_timeout_ms must be > 0 when set".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PipeOptions::default();
        assert!(!options.verbose);
        assert_eq!(options.parallel_workers, 1);
        assert!(options.name_map.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.general.verbose = true;
        config.processing.parallel_workers = 4;
        config.limits.transform_timeout_ms = 2500;

        let options = PipeOptions::from_config(&config);
        assert!(options.verbose);
        assert_eq!(options.parallel_workers, 4);
        assert_eq!(options.transform_timeout_ms, Some(2500));

        config.limits.transform_timeout_ms = 0;
        assert_eq!(PipeOptions::from_config(&config).transform_timeout_ms, None);
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let options: PipeOptions =
            toml::from_str("verbose = true\nquality = 85\n").unwrap();
        assert!(options.verbose);
        assert_eq!(options.extra.get("quality"), Some(&toml::Value::Integer(85)));

        let replaced = options.with_name_map(Some(Arc::new(NameMap::default())));
        assert!(replaced.verbose);
        assert!(replaced.name_map.is_some());
        assert_eq!(replaced.extra.len(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let options = PipeOptions::default().parallel_workers(0);
        assert!(matches!(
            options.validate(),
            Err(PipeError::InvalidConstruction(_))
        ));
    }
}
