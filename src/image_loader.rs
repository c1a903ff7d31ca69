//! Unified image loading
//!
//! Single entry point for decoding field images through the `image` crate.
//! All images are converted to 8-bit RGB so downstream stages see one pixel
//! layout regardless of the source format.
//!
//! Any format the `image` crate recognizes from the file extension is
//! accepted; field datasets are JPEG, PNG or TIFF.

use crate::error::{AnalysisError, PipelineError, Result};
use crate::stages::ImageLoader;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use std::path::Path;

const STAGE: &str = "Image Loader";

/// Load an image from disk as 8-bit RGB
///
/// # Errors
///
/// Returns `AnalysisError::ImageLoadError` if the file cannot be opened or
/// decoded, and `AnalysisError::ProcessingError` for unknown extensions.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    if ImageFormat::from_path(path).is_err() {
        return Err(AnalysisError::ProcessingError(format!(
            "Unknown image format for file: {}",
            path.display()
        )));
    }

    let reader = ImageReader::open(path).map_err(|e| {
        AnalysisError::image_load(format!("Failed to open image file: {}", path.display()), e)
    })?;

    // Extension may lie about the content
    let reader = reader.with_guessed_format().map_err(|e| {
        AnalysisError::image_load(format!("Failed to read image header: {}", path.display()), e)
    })?;

    let img: DynamicImage = reader.decode().map_err(|e| {
        AnalysisError::image_load(format!("Failed to decode image: {}", path.display()), e)
    })?;

    Ok(img.to_rgb8())
}

/// [`ImageLoader`] backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateLoader;

impl ImageLoader for ImageCrateLoader {
    fn load(&self, path: &Path) -> Result<RgbImage> {
        load_image(path).map_err(|e| {
            PipelineError::skip(STAGE, format!("Could not load image: {e}"))
                .with_sample(path.display().to_string())
                .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use image::Rgb;

    #[test]
    fn test_unknown_extension_is_rejected() {
        let err = load_image(Path::new("notes.xyz")).unwrap_err();
        assert!(matches!(err, AnalysisError::ProcessingError(_)));
    }

    #[test]
    fn test_load_png_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        let img = RgbImage::from_pixel(4, 3, Rgb([10, 200, 30]));
        img.save(&path).unwrap();

        let loaded = ImageCrateLoader.load(&path).unwrap();
        assert_eq!(loaded, img);
    }

    #[test]
    fn test_missing_file_is_skip() {
        let err = ImageCrateLoader
            .load(Path::new("does/not/exist.jpg"))
            .unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }

    #[test]
    fn test_garbage_file_is_skip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let err = ImageCrateLoader.load(&path).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }
}
