//! Figure output
//!
//! Saves the raw image next to its segmentation overlay as one PNG under the
//! figure directory, mirroring the dataset's folder layout.

use crate::error::{AnalysisError, Result};
use crate::stages::FigureSink;
use crate::types::Sample;
use image::imageops;
use image::RgbImage;
use std::fs;
use std::path::PathBuf;

/// [`FigureSink`] writing side-by-side PNG figures
#[derive(Debug, Clone)]
pub struct FigureWriter {
    output_dir: PathBuf,
}

impl FigureWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Destination of the figure for `sample`
    pub fn figure_path(&self, sample: &Sample) -> PathBuf {
        let stem = sample
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "figure".to_string());
        self.output_dir
            .join(&sample.root_path)
            .join(format!("{stem}.png"))
    }
}

impl FigureSink for FigureWriter {
    fn record(&self, sample: &Sample, raw: &RgbImage, overlay: &RgbImage) -> Result<()> {
        let path = self.figure_path(sample);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        side_by_side(raw, overlay)
            .save(&path)
            .map_err(|e| AnalysisError::image_load(format!("Failed to save figure {}", path.display()), e))?;
        tracing::debug!(path = %path.display(), "figure saved");
        Ok(())
    }
}

/// `left` and `right` on one canvas, top-aligned
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let width = left.width() + right.width();
    let height = left.height().max(right.height());
    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, left, 0, 0);
    imageops::replace(&mut canvas, right, left.width() as i64, 0);
    canvas
}
