//! imagepipe core - chainable batch image pipelines.
//!
//! A pipe is a set of files selected by glob patterns. Each transform runs as
//! a stage that writes a new generation of temporary files and returns a new
//! pipe over them, while every file keeps track of the name it started with.
//!
//! # Architecture
//!
//! ```text
//! Selectors → Pipe ─stage→ Pipe ─stage→ Pipe ─save→ output dir (original names)
//!                     │           │
//!                     └── temp dirs owned by TempRegistry, swept at shutdown
//! ```
//!
//! Pixel work is delegated to an [`ImageBackend`] and a [`SpriteBackend`];
//! the bundled ones use the `image` crate.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use imagepipe_core::{Config, ImagePipe, TempRegistry};
//!
//! #[tokio::main]
//! async fn main() -> imagepipe_core::Result<()> {
//!     let config = Config::load()?;
//!     let registry = Arc::new(TempRegistry::from_config(&config));
//!     let imagepipe = ImagePipe::new(config, registry.clone())?;
//!
//!     imagepipe
//!         .pipe(["photos/*.jpg"])?
//!         .thumbnail(100, None)
//!         .await?
//!         .save("out")?;
//!
//!     registry.sweep();
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod sprite;

// Re-exports for convenient access
pub use backend::{ImageBackend, ImageOp, RasterBackend, TransformOutcome};
pub use config::Config;
pub use error::{ConfigError, ImagePipeError, PipeError, PipeResult, Result};
pub use pipeline::{Pipe, PipeEnv, PipeOptions, SpriteOutput, TempRegistry};
pub use progress::{ConsoleProgress, NoProgress, ProgressReporter, StageProgress};
pub use sprite::{SheetComposer, SpriteBackend, SpriteLayout, SpriteOptions};

use std::path::PathBuf;
use std::sync::Arc;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point bundling configuration with the collaborators pipes share.
pub struct ImagePipe {
    config: Config,
    env: PipeEnv,
}

impl ImagePipe {
    /// Create an instance using `registry` for every stage directory.
    pub fn new(config: Config, registry: Arc<TempRegistry>) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Initializing imagepipe v{}", VERSION);
        Ok(Self {
            config,
            env: PipeEnv::new(registry),
        })
    }

    /// Create an instance from the default config file and a registry built from it.
    pub fn with_defaults() -> Result<Self> {
        let config = Config::load()?;
        let registry = Arc::new(TempRegistry::from_config(&config));
        Self::new(config, registry)
    }

    pub fn with_image_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.env = self.env.with_image_backend(backend);
        self
    }

    pub fn with_sprite_backend(mut self, backend: Arc<dyn SpriteBackend>) -> Self {
        self.env = self.env.with_sprite_backend(backend);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.env = self.env.with_reporter(reporter);
        self
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registry owning every stage directory.
    pub fn registry(&self) -> &Arc<TempRegistry> {
        self.env.registry()
    }

    /// Options every new pipe starts with.
    pub fn options(&self) -> PipeOptions {
        PipeOptions::from_config(&self.config)
    }

    /// Create a pipe over `selectors` with config-derived options.
    pub fn pipe<I, S>(&self, selectors: I) -> Result<Pipe>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pipe_with(selectors, self.options())
    }

    /// Create a pipe over `selectors` with explicit options.
    pub fn pipe_with<I, S>(&self, selectors: I, options: PipeOptions) -> Result<Pipe>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Pipe::new(selectors, options, self.env.clone())?)
    }

    /// Sprite options seeded from the `[sprite]` config section.
    pub fn sprite_options(&self, output_image: impl Into<PathBuf>) -> SpriteOptions {
        SpriteOptions::from_config(&self.config.sprite, output_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let result = ImagePipe::new(config, Arc::new(TempRegistry::new()));
        assert!(matches!(result, Err(ImagePipeError::Config(_))));
    }

    #[test]
    fn test_pipe_uses_config_options() {
        let mut config = Config::default();
        config.general.verbose = true;
        config.sprite.padding = 3;
        let imagepipe = ImagePipe::new(config, Arc::new(TempRegistry::new())).unwrap();

        let pipe = imagepipe.pipe(["does/not/exist/*.png"]).unwrap();
        assert!(pipe.options().verbose);
        assert!(pipe.is_empty());
        assert_eq!(imagepipe.sprite_options("s.png").padding, 3);
    }
}
