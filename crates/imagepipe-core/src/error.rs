//! Error types for the imagepipe pipeline.
//!
//! Errors are organized by concern: configuration problems, and failures raised
//! while a pipe resolves, transforms or exports its files. Pipe errors carry the
//! offending path so a failed stage points at the file that broke it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for imagepipe operations.
#[derive(Error, Debug)]
pub enum ImagePipeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipe construction and stage errors
    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised by a pipe or one of its stages.
#[derive(Error, Debug)]
pub enum PipeError {
    /// The pipe was constructed with an unusable selector or option set
    #[error("Invalid pipe construction: {0}")]
    InvalidConstruction(String),

    /// A selector is not a valid glob pattern
    #[error("Invalid selector '{selector}': {message}")]
    InvalidPattern { selector: String, message: String },

    /// A stage could not create its output directory
    #[error("Failed to create temporary directory: {source}")]
    TempDirCreationFailed {
        #[source]
        source: std::io::Error,
    },

    /// A stage could not allocate an output file in its directory
    #[error("Failed to create temporary file in {dir}: {source}")]
    TempFileCreationFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A generated file has no entry in its pipe's name map
    #[error("No original name recorded for {path} (basename '{basename}')")]
    MissingMapping { path: PathBuf, basename: String },

    /// The image or sprite backend failed on a file
    #[error("Transform '{stage}' failed for {path}: {message}")]
    TransformFailed {
        path: PathBuf,
        stage: String,
        message: String,
    },

    /// A transform exceeded the configured per-file timeout
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// Copying a file to its export destination failed
    #[error("Failed to export {path} to {destination}: {source}")]
    ExportFailed {
        path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipeError {
    /// Build a `TransformFailed` for `path` in the named stage.
    pub fn transform(path: impl Into<PathBuf>, stage: &str, message: impl Into<String>) -> Self {
        PipeError::TransformFailed {
            path: path.into(),
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error came from the transform itself (including timeouts)
    /// rather than from resource lifecycle or name bookkeeping.
    pub fn is_transform_failure(&self) -> bool {
        matches!(
            self,
            PipeError::TransformFailed { .. } | PipeError::Timeout { .. }
        )
    }
}

/// Convenience type alias for imagepipe results.
pub type Result<T> = std::result::Result<T, ImagePipeError>;

/// Convenience type alias for pipe-specific results.
pub type PipeResult<T> = std::result::Result<T, PipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_counts_as_transform_failure() {
        let err = PipeError::Timeout {
            path: PathBuf::from("a.jpg"),
            stage: "resize".to_string(),
            timeout_ms: 50,
        };
        assert!(err.is_transform_failure());
        assert!(PipeError::transform("a.jpg", "trim", "boom").is_transform_failure());
    }

    #[test]
    fn test_missing_mapping_is_not_transform_failure() {
        let err = PipeError::MissingMapping {
            path: PathBuf::from("/tmp/x/stage1.png"),
            basename: "stage1.png".to_string(),
        };
        assert!(!err.is_transform_failure());
        assert!(err.to_string().contains("stage1.png"));
    }
}
