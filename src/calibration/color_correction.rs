//! Chart-based color correction
//!
//! Fits a 3×3 matrix `M` minimizing `‖A·M − B‖²`, where the rows of `A` are
//! the measured swatches and the rows of `B` the reference swatches, both in
//! linear sRGB. Every pixel is then mapped through `M` and re-encoded with the
//! sRGB transfer function to 8-bit RGB.

use crate::color::conversion::{linear_to_srgb8, srgb8_to_linear};
use crate::constants::color_checker::{REFERENCE_SRGB8, SWATCH_COUNT};
use crate::error::{PipelineError, Result};
use crate::stages::Calibrator;
use image::{Rgb, Rgb32FImage, RgbImage};
use nalgebra::{DMatrix, Matrix3, RowVector3};

const STAGE: &str = "Color Calibrator";

/// Smallest singular value accepted for the measured swatch matrix
const MIN_SINGULAR_VALUE: f64 = 1e-6;

/// Least-squares calibrator against the ColorChecker 24 reference
#[derive(Debug, Clone)]
pub struct ChartCalibrator {
    reference: Vec<[f32; 3]>,
}

impl Default for ChartCalibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartCalibrator {
    pub fn new() -> Self {
        Self {
            reference: reference_linear().to_vec(),
        }
    }

    /// Correction matrix applied to row vectors of linear RGB
    pub fn fit(&self, measured: &[[f32; 3]]) -> Result<Matrix3<f64>> {
        if measured.len() != self.reference.len() {
            return Err(PipelineError::skip(
                STAGE,
                format!(
                    "Expected {} swatches, got {}",
                    self.reference.len(),
                    measured.len()
                ),
            )
            .into());
        }

        let n = measured.len();
        let a = DMatrix::from_fn(n, 3, |i, j| measured[i][j] as f64);
        let b = DMatrix::from_fn(n, 3, |i, j| self.reference[i][j] as f64);

        let svd = a.svd(true, true);
        if svd.singular_values.min() < MIN_SINGULAR_VALUE {
            return Err(PipelineError::skip(STAGE, "Swatch colors are degenerate").into());
        }
        let m = svd
            .solve(&b, 1e-12)
            .map_err(|e| PipelineError::skip(STAGE, format!("Least squares failed: {e}")))?;

        Ok(Matrix3::from_fn(|i, j| m[(i, j)]))
    }
}

impl Calibrator for ChartCalibrator {
    fn calibrate(&self, image: &Rgb32FImage, swatches: &[[f32; 3]]) -> Result<RgbImage> {
        let m = self.fit(swatches)?;
        let mut out = RgbImage::new(image.width(), image.height());
        for (src, dst) in image.pixels().zip(out.pixels_mut()) {
            let [r, g, b] = src.0;
            let v = RowVector3::new(r as f64, g as f64, b as f64) * m;
            *dst = Rgb(linear_to_srgb8([v[0] as f32, v[1] as f32, v[2] as f32]));
        }
        Ok(out)
    }
}

/// Reference swatches in linear sRGB, reading order
pub fn reference_linear() -> [[f32; 3]; SWATCH_COUNT] {
    REFERENCE_SRGB8.map(srgb8_to_linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_when_measured_matches_reference() {
        let calibrator = ChartCalibrator::new();
        let m = calibrator.fit(&reference_linear()).unwrap();
        assert_relative_eq!(m, Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_recovers_channel_gains() {
        // Camera saw everything with half the red and 80% of the blue
        let measured: Vec<[f32; 3]> = reference_linear()
            .iter()
            .map(|c| [c[0] * 0.5, c[1], c[2] * 0.8])
            .collect();
        let m = ChartCalibrator::new().fit(&measured).unwrap();
        assert_relative_eq!(m[(0, 0)], 2.0, epsilon = 1e-4);
        assert_relative_eq!(m[(1, 1)], 1.0, epsilon = 1e-4);
        assert_relative_eq!(m[(2, 2)], 1.25, epsilon = 1e-4);
        assert_relative_eq!(m[(0, 1)], 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_calibrate_keeps_dimensions_and_corrects() {
        let measured: Vec<[f32; 3]> = reference_linear()
            .iter()
            .map(|c| [c[0] * 0.5, c[1], c[2]])
            .collect();
        let gray = srgb8_to_linear([128, 128, 128]);
        let image = Rgb32FImage::from_pixel(7, 3, Rgb([gray[0] * 0.5, gray[1], gray[2]]));

        let out = ChartCalibrator::new().calibrate(&image, &measured).unwrap();
        assert_eq!(out.dimensions(), (7, 3));
        let px = out.get_pixel(3, 1).0;
        for c in px {
            assert!((c as i32 - 128).abs() <= 1, "{px:?}");
        }
    }

    #[test]
    fn test_wrong_swatch_count_is_skip() {
        let err = ChartCalibrator::new().fit(&[[0.5, 0.5, 0.5]; 10]).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }

    #[test]
    fn test_flat_swatches_are_degenerate() {
        let err = ChartCalibrator::new().fit(&[[0.5, 0.5, 0.5]; 24]).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }
}
