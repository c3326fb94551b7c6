//! Pipeline components.
//!
//! - **selector**: expand glob selectors into a file list
//! - **registry**: own every temporary stage directory until the sweep
//! - **names**: track original file names across generations
//! - **options**: per-pipe options
//! - **pipe**: the chainable pipe and its stage runner

pub mod names;
pub mod options;
pub mod pipe;
pub mod registry;
pub mod selector;

// Re-exports for convenient access
pub use names::{original_name, original_stem, NameEntry, NameMap, TempFileHandle};
pub use options::PipeOptions;
pub use pipe::{Pipe, PipeEnv, SpriteManifest, SpriteOutput};
pub use registry::TempRegistry;
pub use selector::FileSetResolver;
