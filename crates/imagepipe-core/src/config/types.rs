//! Sub-configuration structs with their defaults.

use crate::sprite::SpriteLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Report per-file progress while stages run
    pub verbose: bool,
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of files transformed concurrently within one stage (1 = sequential)
    pub parallel_workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 1,
        }
    }
}

/// Limits applied to backend calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-file transform timeout in milliseconds (0 disables the timeout)
    pub transform_timeout_ms: u64,
}

/// Temporary generation storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    /// Parent directory for stage directories (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Name prefix for stage directories
    pub prefix: String,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "imagepipe".to_string(),
        }
    }
}

/// Sprite sheet defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteConfig {
    /// How images are laid out on the sheet
    pub layout: SpriteLayout,

    /// Transparent gap between neighbouring images, in pixels
    pub padding: u32,

    /// CSS selector prefix placed before each image's name
    pub selector: String,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            layout: SpriteLayout::Horizontal,
            padding: 0,
            selector: "img.".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
