//! Image scaling backed by the `image` crate.

use ::image::imageops::FilterType;
use ::image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use ocrgate_core::{ImageScaler, ScaleError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Target size for `(width, height)` so neither side exceeds `max_dimension`.
///
/// Uses one uniform factor `min(max / width, max / height)`; images already
/// within bounds are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    let max = f64::from(max_dimension);
    let scale = f64::min(max / f64::from(width), max / f64::from(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);
    (scaled(width), scaled(height))
}

/// Where the downscaled copy of `path` is written: `<stem>.scaled.png` beside it.
pub fn scaled_copy_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    path.with_file_name(format!("{stem}.scaled.png"))
}

/// Decodes by content sniffing, converts to RGB8 and resizes with a triangle filter.
#[derive(Debug, Clone)]
pub struct ImageCrateScaler {
    filter: FilterType,
}

impl Default for ImageCrateScaler {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl ImageCrateScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn open(path: &Path) -> Result<DynamicImage, ScaleError> {
        ImageReader::open(path)
            .map_err(|e| ScaleError::new(path, e))?
            .with_guessed_format()
            .map_err(|e| ScaleError::new(path, e))?
            .decode()
            .map_err(|e| ScaleError::new(path, e))
    }
}

impl ImageScaler for ImageCrateScaler {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32), ScaleError> {
        ImageReader::open(path)
            .map_err(|e| ScaleError::new(path, e))?
            .with_guessed_format()
            .map_err(|e| ScaleError::new(path, e))?
            .into_dimensions()
            .map_err(|e| ScaleError::new(path, e))
    }

    fn scale_to_fit(&self, path: &Path, max_dimension: u32) -> Result<PathBuf, ScaleError> {
        let image = Self::open(path)?;
        let (width, height) = image.dimensions();
        let (target_w, target_h) = fit_within(width, height, max_dimension);

        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let scaled = rgb.resize_exact(target_w, target_h, self.filter);

        let out = scaled_copy_path(path);
        if let Err(e) = scaled.save_with_format(&out, ImageFormat::Png) {
            let _ = std::fs::remove_file(&out);
            return Err(ScaleError::new(&out, e));
        }

        debug!(
            from = %format!("{width}x{height}"),
            to = %format!("{target_w}x{target_h}"),
            path = %out.display(),
            "Wrote scaled working copy"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};

    #[test]
    fn fit_keeps_small_images() {
        assert_eq!(fit_within(600, 200, 4096), (600, 200));
        assert_eq!(fit_within(4096, 10, 4096), (4096, 10));
    }

    #[test]
    fn fit_uses_uniform_factor() {
        assert_eq!(fit_within(3000, 2000, 1000), (1000, 667));
        assert_eq!(fit_within(2000, 8000, 4000), (1000, 4000));
    }

    #[test]
    fn scaled_path_sits_beside_original() {
        let p = scaled_copy_path(Path::new("/tmp/upload/abc.jpeg"));
        assert_eq!(p, PathBuf::from("/tmp/upload/abc.scaled.png"));
    }

    #[test]
    fn scales_image_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wide.png");
        RgbImage::from_pixel(300, 100, Rgb([255, 255, 255]))
            .save(&src)
            .unwrap();

        let scaler = ImageCrateScaler::new();
        assert_eq!(scaler.dimensions(&src).unwrap(), (300, 100));

        let out = scaler.scale_to_fit(&src, 150).unwrap();
        assert!(out.exists());
        assert_eq!(scaler.dimensions(&out).unwrap(), (150, 50));
    }

    #[test]
    fn undecodable_file_is_scale_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.png");
        std::fs::write(&src, b"not an image").unwrap();
        let err = ImageCrateScaler::new().scale_to_fit(&src, 10).unwrap_err();
        assert_eq!(err.path, src);
    }
}
