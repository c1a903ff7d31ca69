//! Stage contracts
//!
//! The pipeline depends only on these traits. Every concrete algorithm in the
//! crate implements exactly one of them, and tests substitute stubs freely.

use crate::error::Result;
use crate::types::{ChartQuad, Measurement, PatchRegion, Sample};
use image::{GrayImage, Rgb32FImage, RgbImage};
use std::path::Path;

/// Output of chart detection
#[derive(Debug, Clone)]
pub struct ChartDetection {
    /// Linear-light RGB image in [0, 1]
    pub normalized: Rgb32FImage,
    /// Measured chart swatches in linear RGB, chart reading order
    pub swatches: Vec<[f32; 3]>,
    /// Chart corners in the pixel space of `normalized`
    pub quad: ChartQuad,
}

/// Output of plant segmentation
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// 255 where plant material is present, 0 elsewhere
    pub mask: GrayImage,
    /// Input image with non-plant pixels blacked out
    pub overlay: RgbImage,
}

/// Decodes the raw image of a sample
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<RgbImage>;
}

/// Locates the reference chart and reads its swatches
pub trait ChartDetector {
    fn detect(&self, path: &Path) -> Result<ChartDetection>;
}

/// Produces a binary plant mask with the chart region excluded
pub trait Segmentor {
    fn segment(&self, image: &Rgb32FImage, chart: &ChartQuad) -> Result<Segmentation>;
}

/// Maps measured swatch colors onto the reference chart
pub trait Calibrator {
    fn calibrate(&self, image: &Rgb32FImage, swatches: &[[f32; 3]]) -> Result<RgbImage>;
}

/// Chooses the rectangles to analyze; may return fewer than `count`
pub trait PatchSelector {
    fn select(&self, image: &RgbImage, chart: &ChartQuad, count: usize) -> Result<Vec<PatchRegion>>;
}

/// Reduces a patch and its plant mask to a scalar greenness index
pub trait IndexCalculator {
    fn compute(&self, patch: &RgbImage, mask: &GrayImage) -> Result<f64>;
}

/// Persists the measurements of a run; called at most once
pub trait ResultWriter {
    fn write_all(&mut self, measurements: Vec<Measurement>) -> Result<()>;
}

/// Produces the ordered sample list for a dataset root
pub trait DatasetDiscovery {
    fn discover(&mut self, root: &Path) -> Result<Vec<Sample>>;
}

/// Side channel for inspecting intermediate images
pub trait FigureSink {
    fn record(&self, sample: &Sample, raw: &RgbImage, overlay: &RgbImage) -> Result<()>;
}
