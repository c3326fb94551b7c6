//! Strip layout sprite composer built on the `image` crate.

use image::{ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use super::{SpriteBackend, SpriteLayout, SpriteOptions, SpritePlacement, SpriteSheet};
use crate::error::{PipeError, PipeResult};

/// Transparent color used for the sheet background and padding
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Places every image of a directory in a single row or column.
///
/// Images are taken in file name order. Identifiers are the file stems.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetComposer;

impl SpriteBackend for SheetComposer {
    fn compose(&self, dir: &Path, options: &SpriteOptions) -> PipeResult<SpriteSheet> {
        let sources = list_images(dir)?;
        if sources.is_empty() {
            return Err(PipeError::transform(dir, "sprite", "no images to compose"));
        }

        let mut frames = Vec::with_capacity(sources.len());
        for path in sources {
            let image = image::open(&path)
                .map_err(|e| PipeError::transform(&path, "sprite", e.to_string()))?
                .to_rgba8();
            frames.push((path, image));
        }

        let (sheet_w, sheet_h, offsets) = layout(
            frames.iter().map(|(_, f)| f.dimensions()),
            options.layout,
            options.padding,
        )
        .ok_or_else(|| PipeError::transform(dir, "sprite", "sheet too large"))?;

        let mut sheet = RgbaImage::from_pixel(sheet_w, sheet_h, TRANSPARENT);
        let url = options.image_url();
        let mut placements = Vec::with_capacity(frames.len());

        for ((path, frame), (x, y)) in frames.iter().zip(offsets) {
            image::imageops::replace(&mut sheet, frame, i64::from(x), i64::from(y));
            let (width, height) = frame.dimensions();
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            placements.push(SpritePlacement {
                source: path.clone(),
                id,
                x,
                y,
                width,
                height,
                style: format!(
                    "width: {}px; height: {}px; background: url({}) -{}px -{}px no-repeat;",
                    width, height, url, x, y
                ),
            });
        }

        sheet
            .save_with_format(&options.output_image, ImageFormat::Png)
            .map_err(|e| PipeError::transform(&options.output_image, "sprite", e.to_string()))?;

        tracing::debug!(
            "Composed {} image(s) into {:?} ({}x{})",
            placements.len(),
            options.output_image,
            sheet_w,
            sheet_h
        );

        Ok(SpriteSheet {
            image: options.output_image.clone(),
            width: sheet_w,
            height: sheet_h,
            placements,
        })
    }
}

/// Regular files of `dir`, sorted by name.
fn list_images(dir: &Path) -> PipeResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| PipeError::transform(dir, "sprite", format!("Cannot list directory: {}", e)))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Sheet size and top-left offset of each frame, or `None` when the sheet
/// would not fit in `u32` pixels.
fn layout(
    sizes: impl Iterator<Item = (u32, u32)>,
    layout: SpriteLayout,
    padding: u32,
) -> Option<(u32, u32, Vec<(u32, u32)>)> {
    let mut offsets = Vec::new();
    let mut cursor = 0u32;
    let mut cross = 0u32;

    for (w, h) in sizes {
        if !offsets.is_empty() {
            cursor = cursor.checked_add(padding)?;
        }
        match layout {
            SpriteLayout::Horizontal => {
                offsets.push((cursor, 0));
                cursor = cursor.checked_add(w)?;
                cross = cross.max(h);
            }
            SpriteLayout::Vertical => {
                offsets.push((0, cursor));
                cursor = cursor.checked_add(h)?;
                cross = cross.max(w);
            }
        }
    }

    let (width, height) = match layout {
        SpriteLayout::Horizontal => (cursor, cross),
        SpriteLayout::Vertical => (cross, cursor),
    };
    Some((width.max(1), height.max(1), offsets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_horizontal_layout() {
        let (w, h, offsets) = layout(
            vec![(4, 2), (3, 5)].into_iter(),
            SpriteLayout::Horizontal,
            1,
        )
        .unwrap();
        assert_eq!((w, h), (8, 5));
        assert_eq!(offsets, vec![(0, 0), (5, 0)]);
    }

    #[test]
    fn test_vertical_layout() {
        let (w, h, offsets) =
            layout(vec![(4, 2), (3, 5)].into_iter(), SpriteLayout::Vertical, 0).unwrap();
        assert_eq!((w, h), (4, 7));
        assert_eq!(offsets, vec![(0, 0), (0, 2)]);
    }

    #[test]
    fn test_layout_overflow() {
        let sizes = vec![(u32::MAX - 4, 1), (8, 1)];
        assert!(layout(sizes.clone().into_iter(), SpriteLayout::Horizontal, 0).is_none());
        assert!(layout(vec![(u32::MAX, 1), (1, 1)].into_iter(), SpriteLayout::Horizontal, 0).is_none());
        assert!(layout(vec![(1, u32::MAX - 1), (1, 1)].into_iter(), SpriteLayout::Vertical, 2).is_none());
        assert!(layout(sizes.into_iter(), SpriteLayout::Vertical, 0).is_some());
    }

    #[test]
    fn test_compose_directory() {
        let src = tempfile::tempdir().unwrap();
        write_png(src.path(), "b.png", 6, 4);
        write_png(src.path(), "a.png", 2, 8);
        let out = tempfile::tempdir().unwrap();
        let options = SpriteOptions::new(out.path().join("sheet.png"));

        let sheet = SheetComposer.compose(src.path(), &options).unwrap();

        assert_eq!((sheet.width, sheet.height), (8, 8));
        assert_eq!(image::image_dimensions(&sheet.image).unwrap(), (8, 8));
        let ids: Vec<_> = sheet.placements.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            sheet.placements[1].style,
            "width: 6px; height: 4px; background: url(sheet.png) -2px -0px no-repeat;"
        );
    }

    #[test]
    fn test_compose_empty_directory_fails() {
        let src = tempfile::tempdir().unwrap();
        let options = SpriteOptions::new(src.path().join("sheet.png"));
        let err = SheetComposer.compose(src.path(), &options).unwrap_err();
        assert!(err.is_transform_failure());
    }
}
