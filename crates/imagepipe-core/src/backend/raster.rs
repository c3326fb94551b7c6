//! Reference backend built on the `image` crate.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::path::Path;

use super::{ImageBackend, ImageOp, TransformOutcome};
use crate::error::{PipeError, PipeResult};

/// In-process raster backend: decodes, transforms and re-encodes each file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBackend;

impl RasterBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ImageBackend for RasterBackend {
    fn apply(&self, op: &ImageOp, input: &Path, output: &Path) -> PipeResult<TransformOutcome> {
        let stage = op.name();
        let (image, format) = decode(input, stage)?;

        let result = match *op {
            ImageOp::Resize { width, height } => {
                check_dimensions(input, stage, width, height)?;
                Some(image.resize_exact(width, height, FilterType::CatmullRom))
            }
            ImageOp::ResizeToFit { width, height } => {
                let height = height.unwrap_or(width);
                check_dimensions(input, stage, width, height)?;
                Some(image.resize(width, height, FilterType::Lanczos3))
            }
            ImageOp::ResizeToFill { width, height } => {
                check_dimensions(input, stage, width, height)?;
                Some(image.resize_to_fill(width, height, FilterType::Lanczos3))
            }
            ImageOp::Trim { fuzz } => trim_bounds(&image.to_rgba8(), fuzz)
                .map(|(x, y, w, h)| image.crop_imm(x, y, w, h)),
            ImageOp::Shave { x, y } => Some(shave(&image, x, y, input)?),
        };

        match result {
            Some(out) => {
                encode(&out, output, format, stage)?;
                Ok(TransformOutcome::Written)
            }
            None => Ok(TransformOutcome::Unchanged),
        }
    }
}

/// Decode a file, detecting the format from its content first.
fn decode(path: &Path, stage: &str) -> PipeResult<(DynamicImage, ImageFormat)> {
    let reader = image::ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipeError::transform(path, stage, format!("Cannot open image: {}", e)))?;
    let format = match reader.format() {
        Some(f) => f,
        None => ImageFormat::from_path(path).map_err(|_| {
            PipeError::transform(path, stage, "Unsupported or unrecognised image format")
        })?,
    };
    let image = reader
        .decode()
        .map_err(|e| PipeError::transform(path, stage, e.to_string()))?;
    Ok((image, format))
}

/// Encode using the output extension's format, falling back to the input's.
fn encode(
    image: &DynamicImage,
    output: &Path,
    input_format: ImageFormat,
    stage: &str,
) -> PipeResult<()> {
    let format = ImageFormat::from_path(output).unwrap_or(input_format);
    let result = if format == ImageFormat::Jpeg {
        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(image.to_rgb8()).save_with_format(output, format)
    } else {
        image.save_with_format(output, format)
    };
    result.map_err(|e| PipeError::transform(output, stage, format!("Cannot write image: {}", e)))
}

fn check_dimensions(path: &Path, stage: &str, width: u32, height: u32) -> PipeResult<()> {
    if width == 0 || height == 0 {
        return Err(PipeError::transform(
            path,
            stage,
            format!("target dimensions must be > 0, got {}x{}", width, height),
        ));
    }
    Ok(())
}

/// Bounding box `(x, y, w, h)` of pixels that differ from the top-left pixel
/// by more than `fuzz` in any channel. `None` when the image is uniform.
fn trim_bounds(image: &RgbaImage, fuzz: u8) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let background = *image.get_pixel(0, 0);

    let mut min_x = width;
    let mut min_y = height;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if differs(pixel, &background, fuzz) {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            found = true;
        }
    }

    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

fn differs(a: &Rgba<u8>, b: &Rgba<u8>, fuzz: u8) -> bool {
    a.0.iter().zip(b.0.iter()).any(|(x, y)| x.abs_diff(*y) > fuzz)
}

fn shave(image: &DynamicImage, x: u32, y: u32, path: &Path) -> PipeResult<DynamicImage> {
    let (width, height) = image.dimensions();
    let shaved_w = x.checked_mul(2).filter(|&d| d < width).map(|d| width - d);
    let shaved_h = y.checked_mul(2).filter(|&d| d < height).map(|d| height - d);
    match (shaved_w, shaved_h) {
        (Some(w), Some(h)) => Ok(image.crop_imm(x, y, w, h)),
        _ => Err(PipeError::transform(
            path,
            "shave",
            format!(
                "shaving {}x{} leaves nothing of a {}x{} image",
                x, y, width, height
            ),
        )),
    }
}
