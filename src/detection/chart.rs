//! Reference chart localization and swatch sampling
//!
//! The chart corners come from a [`ChartSource`]: a JSON annotation next to
//! each image (as written by an external chart detector or by hand) or a
//! fixed quad for rigs where the chart never moves. Given the corners, a
//! homography from the ideal 6×4 swatch grid onto the quad locates every swatch
//! center, and the linear-light pixels around it are averaged.
//!
//! Swatches are returned in reading order starting at the top-left corner,
//! matching [`crate::constants::color_checker::REFERENCE_SRGB8`].

use super::homography;
use crate::color::conversion::linearize;
use crate::config::{ChartConfig, ChartSource};
use crate::constants::color_checker::{COLUMNS, ROWS};
use crate::error::{PipelineError, Result};
use crate::image_loader::load_image;
use crate::stages::{ChartDetection, ChartDetector};
use crate::types::ChartQuad;
use image::Rgb32FImage;
use std::path::{Path, PathBuf};

const STAGE: &str = "Checker Detector";

/// Samples per axis inside each swatch window
const SAMPLES_PER_AXIS: usize = 5;

/// Chart detector driven by known chart corners
#[derive(Debug, Clone)]
pub struct QuadChartDetector {
    source: ChartSource,
    sample_fraction: f32,
}

impl QuadChartDetector {
    pub fn new(config: &ChartConfig) -> Self {
        Self {
            source: config.source.clone(),
            sample_fraction: config.sample_fraction,
        }
    }

    /// Path of the annotation belonging to `image_path`
    pub fn sidecar_path(image_path: &Path, suffix: &str) -> PathBuf {
        let mut name = image_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        image_path.with_file_name(name)
    }

    fn locate(&self, image_path: &Path) -> Result<ChartQuad> {
        match &self.source {
            ChartSource::Fixed { quad } => Ok(*quad),
            ChartSource::Sidecar { suffix } => {
                let sidecar = Self::sidecar_path(image_path, suffix);
                let content = std::fs::read_to_string(&sidecar).map_err(|_| {
                    PipelineError::skip(STAGE, "No ColorChecker detected")
                })?;
                serde_json::from_str::<ChartQuad>(&content).map_err(|e| {
                    PipelineError::skip(
                        STAGE,
                        format!("Malformed chart annotation {}: {e}", sidecar.display()),
                    )
                    .into()
                })
            }
        }
    }

    /// Average linear RGB of every swatch, reading order
    pub fn sample_swatches(&self, image: &Rgb32FImage, quad: &ChartQuad) -> Result<Vec<[f32; 3]>> {
        let (w, h) = image.dimensions();
        if quad.corners.iter().any(|c| {
            c[0] < 0 || c[1] < 0 || c[0] as u32 >= w || c[1] as u32 >= h
        }) {
            return Err(PipelineError::skip(STAGE, "Chart quadrilateral lies outside the image").into());
        }
        if quad_area(quad) < (COLUMNS * ROWS) as f64 {
            return Err(PipelineError::skip(STAGE, "Chart quadrilateral is degenerate").into());
        }

        let grid = [
            [0.0, 0.0],
            [COLUMNS as f64, 0.0],
            [COLUMNS as f64, ROWS as f64],
            [0.0, ROWS as f64],
        ];
        let corners = quad.corners.map(|c| [c[0] as f64, c[1] as f64]);
        let hom = homography::from_four_points(&grid, &corners)
            .ok_or_else(|| PipelineError::skip(STAGE, "Chart quadrilateral is degenerate"))?;

        let half = self.sample_fraction as f64 / 2.0;
        let step = if SAMPLES_PER_AXIS > 1 {
            2.0 * half / (SAMPLES_PER_AXIS - 1) as f64
        } else {
            0.0
        };

        let mut swatches = Vec::with_capacity(COLUMNS * ROWS);
        for row in 0..ROWS {
            for col in 0..COLUMNS {
                let cx = col as f64 + 0.5;
                let cy = row as f64 + 0.5;
                let mut sum = [0.0f64; 3];
                let mut n = 0usize;
                for j in 0..SAMPLES_PER_AXIS {
                    for i in 0..SAMPLES_PER_AXIS {
                        let gx = cx - half + i as f64 * step;
                        let gy = cy - half + j as f64 * step;
                        let Some([px, py]) = homography::project(&hom, gx, gy) else {
                            continue;
                        };
                        let x = px.round().clamp(0.0, (w - 1) as f64) as u32;
                        let y = py.round().clamp(0.0, (h - 1) as f64) as u32;
                        let p = image.get_pixel(x, y).0;
                        for (acc, v) in sum.iter_mut().zip(p) {
                            *acc += v as f64;
                        }
                        n += 1;
                    }
                }
                if n == 0 {
                    return Err(PipelineError::skip(
                        STAGE,
                        format!("Swatch ({row}, {col}) could not be sampled"),
                    )
                    .into());
                }
                swatches.push(sum.map(|s| (s / n as f64) as f32));
            }
        }
        Ok(swatches)
    }
}

impl ChartDetector for QuadChartDetector {
    fn detect(&self, path: &Path) -> Result<ChartDetection> {
        let raw = load_image(path)
            .map_err(|e| PipelineError::skip(STAGE, format!("Could not read image: {e}")))?;
        let normalized = linearize(&raw);
        let quad = self.locate(path)?;
        let swatches = self.sample_swatches(&normalized, &quad)?;
        tracing::debug!(image = %path.display(), ?quad, "chart located");

        Ok(ChartDetection {
            normalized,
            swatches,
            quad,
        })
    }
}

/// Shoelace area of the quad in square pixels
fn quad_area(quad: &ChartQuad) -> f64 {
    let c = &quad.corners;
    let twice: i64 = (0..4)
        .map(|i| {
            let (a, b) = (c[i], c[(i + 1) % 4]);
            a[0] as i64 * b[1] as i64 - b[0] as i64 * a[1] as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}
