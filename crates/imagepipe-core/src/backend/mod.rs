//! Image transform backends.
//!
//! A backend reads one input file, applies a single [`ImageOp`] and writes the
//! result to the output path chosen by the stage runner. The pipe never looks
//! at pixels itself.

pub mod raster;

pub use raster::RasterBackend;

use std::fmt;
use std::path::Path;

use crate::error::PipeResult;

/// A single image operation understood by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOp {
    /// Resize to exactly `width` x `height`, ignoring aspect ratio
    Resize { width: u32, height: u32 },
    /// Scale to fit inside `width` x `height` (square box when height is absent)
    ResizeToFit { width: u32, height: Option<u32> },
    /// Scale to cover `width` x `height`, then crop the overflow
    ResizeToFill { width: u32, height: u32 },
    /// Crop away a uniform border matching the top-left pixel within `fuzz`
    Trim { fuzz: u8 },
    /// Remove `x` columns from both sides and `y` rows from top and bottom
    Shave { x: u32, y: u32 },
}

impl ImageOp {
    /// Short operation name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ImageOp::Resize { .. } => "resize",
            ImageOp::ResizeToFit { .. } => "thumbnail",
            ImageOp::ResizeToFill { .. } => "cropped_thumbnail",
            ImageOp::Trim { .. } => "trim",
            ImageOp::Shave { .. } => "shave",
        }
    }
}

impl fmt::Display for ImageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageOp::Resize { width, height } => write!(f, "resize({width}x{height})"),
            ImageOp::ResizeToFit {
                width,
                height: Some(height),
            } => write!(f, "thumbnail({width}x{height})"),
            ImageOp::ResizeToFit {
                width,
                height: None,
            } => write!(f, "thumbnail({width})"),
            ImageOp::ResizeToFill { width, height } => {
                write!(f, "cropped_thumbnail({width}x{height})")
            }
            ImageOp::Trim { fuzz } => write!(f, "trim({fuzz})"),
            ImageOp::Shave { x, y } => write!(f, "shave({x}x{y})"),
        }
    }
}

/// What a backend did with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// A new image was written to the output path
    Written,
    /// No usable result; the stage passes the input through unchanged
    Unchanged,
}

/// Applies image operations file-to-file.
///
/// Implementations must be callable from blocking worker threads.
pub trait ImageBackend: Send + Sync {
    /// Apply `op` to `input` and write the result to `output`.
    ///
    /// Returning [`TransformOutcome::Unchanged`] leaves `output` for the
    /// caller to fill with a copy of `input`.
    fn apply(&self, op: &ImageOp, input: &Path, output: &Path) -> PipeResult<TransformOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_display() {
        assert_eq!(
            ImageOp::ResizeToFit {
                width: 100,
                height: None
            }
            .to_string(),
            "thumbnail(100)"
        );
        assert_eq!(
            ImageOp::Shave { x: 2, y: 3 }.to_string(),
            "shave(2x3)"
        );
        assert_eq!(ImageOp::Trim { fuzz: 8 }.name(), "trim");
    }
}
