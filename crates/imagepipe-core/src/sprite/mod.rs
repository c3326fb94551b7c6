//! Sprite sheet composition.
//!
//! A [`SpriteBackend`] turns a flat directory of images into one composite
//! image plus a style fragment per image. The pipe then rewrites each
//! generated identifier to the image's original name when building CSS.

pub mod sheet;

pub use sheet::SheetComposer;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::SpriteConfig;
use crate::error::PipeResult;

/// Arrangement of images on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteLayout {
    /// One row, left to right
    #[default]
    Horizontal,
    /// One column, top to bottom
    Vertical,
}

/// Options for one sprite sheet run.
#[derive(Debug, Clone)]
pub struct SpriteOptions {
    /// Where the composite image is written (PNG)
    pub output_image: PathBuf,
    /// Where the stylesheet is written, if anywhere
    pub stylesheet: Option<PathBuf>,
    /// CSS selector prefix placed before each image's name
    pub selector: String,
    /// Arrangement of images on the sheet
    pub layout: SpriteLayout,
    /// Gap between neighbouring images, in pixels
    pub padding: u32,
    /// URL of the sheet inside `background:` declarations (defaults to the image's file name)
    pub image_url: Option<String>,
}

impl SpriteOptions {
    /// Options with default layout and selector writing to `output_image`.
    pub fn new(output_image: impl Into<PathBuf>) -> Self {
        Self::from_config(&SpriteConfig::default(), output_image)
    }

    /// Options seeded from the `[sprite]` configuration section.
    pub fn from_config(config: &SpriteConfig, output_image: impl Into<PathBuf>) -> Self {
        Self {
            output_image: output_image.into(),
            stylesheet: None,
            selector: config.selector.clone(),
            layout: config.layout,
            padding: config.padding,
            image_url: None,
        }
    }

    /// URL referenced from generated styles.
    pub fn image_url(&self) -> String {
        self.image_url.clone().unwrap_or_else(|| {
            self.output_image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Placement of one source image on the composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpritePlacement {
    /// File the image was read from
    pub source: PathBuf,
    /// Identifier generated by the backend
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// CSS declarations positioning the image (without selector or braces)
    pub style: String,
}

/// Result of composing a directory into a sprite sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteSheet {
    /// Path of the composite image
    pub image: PathBuf,
    pub width: u32,
    pub height: u32,
    /// One placement per source image
    pub placements: Vec<SpritePlacement>,
}

/// Composes a flat directory of images into a sprite sheet.
pub trait SpriteBackend: Send + Sync {
    fn compose(&self, dir: &Path, options: &SpriteOptions) -> PipeResult<SpriteSheet>;
}

/// One CSS rule, keyed by the image's original name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpriteRule {
    /// Original basename of the image, extension removed
    pub name: String,
    /// Full selector (`prefix` + sanitised name)
    pub selector: String,
    /// CSS declarations
    pub style: String,
}

impl SpriteRule {
    /// Build a rule for `original_stem`; dots and spaces become underscores.
    pub fn new(prefix: &str, original_stem: &str, style: &str) -> Self {
        let class: String = original_stem
            .chars()
            .map(|c| if c == '.' || c == ' ' { '_' } else { c })
            .collect();
        Self {
            name: original_stem.to_string(),
            selector: format!("{prefix}{class}"),
            style: style.trim().to_string(),
        }
    }

    /// Render as `selector { style }`.
    pub fn to_css(&self) -> String {
        format!("{} {{ {} }}", self.selector, self.style)
    }
}

/// Join rules into a stylesheet, one rule per line.
pub fn stylesheet(rules: &[SpriteRule]) -> String {
    rules
        .iter()
        .map(SpriteRule::to_css)
        .collect::<Vec<_>>()
        .join("\n")
}
