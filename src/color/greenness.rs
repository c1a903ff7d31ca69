//! Greenness index computation over masked patches
//!
//! Both indices take the median over plant pixels that are neither too dark
//! nor neutral:
//! - ExG: `2g - r - b` on the 0-255 scale
//! - NGRDI: `(g - r) / (g + r)`, in [-1, 1]

use crate::config::GreennessMethod;
use crate::constants::greenness::{MIN_GREEN_RED_DIFF, MIN_GREEN_RED_SUM, NGRDI_EPSILON};
use crate::error::{PipelineError, Result};
use crate::stages::IndexCalculator;
use image::{GrayImage, RgbImage};

const STAGE: &str = "Green Index Calculator";

/// Greenness index calculator for a fixed method
#[derive(Debug, Clone)]
pub struct GreennessCalculator {
    method: GreennessMethod,
    min_green_red_sum: f32,
    min_green_red_diff: f32,
}

impl GreennessCalculator {
    pub fn new(method: GreennessMethod) -> Self {
        Self {
            method,
            min_green_red_sum: MIN_GREEN_RED_SUM,
            min_green_red_diff: MIN_GREEN_RED_DIFF,
        }
    }

    /// Per-pixel index values of plant pixels that pass the filters
    fn index_values(&self, patch: &RgbImage, mask: &GrayImage) -> Vec<f32> {
        patch
            .pixels()
            .zip(mask.pixels())
            .filter(|(_, m)| m.0[0] > 0)
            .filter_map(|(p, _)| {
                let [r, g, b] = p.0.map(f32::from);
                if g + r <= self.min_green_red_sum || (g - r).abs() <= self.min_green_red_diff {
                    return None;
                }
                Some(match self.method {
                    GreennessMethod::Exg => 2.0 * g - r - b,
                    GreennessMethod::Ngrdi => (g - r) / (g + r + NGRDI_EPSILON),
                })
            })
            .collect()
    }
}

impl IndexCalculator for GreennessCalculator {
    fn compute(&self, patch: &RgbImage, mask: &GrayImage) -> Result<f64> {
        if patch.dimensions() != mask.dimensions() {
            return Err(PipelineError::skip(
                STAGE,
                format!(
                    "[SHAPE_MISMATCH] Patch shape {:?} != mask shape {:?}",
                    patch.dimensions(),
                    mask.dimensions()
                ),
            )
            .into());
        }

        let mut values = self.index_values(patch, mask);
        median(&mut values).ok_or_else(|| {
            PipelineError::skip(STAGE, "No vegetation pixels in patch").into()
        })
    }
}

/// Median with the mean of the two middle values for even counts
pub fn median(values: &mut [f32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    let m = if values.len() % 2 == 0 {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    } else {
        values[mid] as f64
    };
    Some(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, Severity};
    use approx::assert_relative_eq;
    use image::{Luma, Rgb};

    fn full_mask(w: u32, h: u32) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([255]))
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_exg_of_uniform_patch() {
        let patch = RgbImage::from_pixel(4, 4, Rgb([60, 140, 40]));
        let calc = GreennessCalculator::new(GreennessMethod::Exg);
        let value = calc.compute(&patch, &full_mask(4, 4)).unwrap();
        assert_relative_eq!(value, 180.0);
    }

    #[test]
    fn test_ngrdi_of_uniform_patch() {
        let patch = RgbImage::from_pixel(2, 3, Rgb([60, 140, 40]));
        let calc = GreennessCalculator::new(GreennessMethod::Ngrdi);
        let value = calc.compute(&patch, &full_mask(2, 3)).unwrap();
        assert_relative_eq!(value, 80.0 / 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_masked_and_dark_pixels_are_ignored() {
        let mut patch = RgbImage::from_pixel(3, 1, Rgb([60, 140, 40]));
        patch.put_pixel(1, 0, Rgb([255, 0, 255]));
        patch.put_pixel(2, 0, Rgb([5, 10, 5]));
        let mut mask = full_mask(3, 1);
        mask.put_pixel(1, 0, Luma([0]));

        let calc = GreennessCalculator::new(GreennessMethod::Exg);
        assert_relative_eq!(calc.compute(&patch, &mask).unwrap(), 180.0);
    }

    #[test]
    fn test_dimension_mismatch_is_skip() {
        let calc = GreennessCalculator::new(GreennessMethod::Ngrdi);
        let patch = RgbImage::new(5, 4);
        for (w, h) in [(4, 4), (5, 3), (6, 4), (1, 1)] {
            let err = calc.compute(&patch, &full_mask(w, h)).unwrap_err();
            match err {
                AnalysisError::Pipeline(e) => {
                    assert_eq!(e.severity, Severity::Skip);
                    assert_eq!(e.stage, STAGE);
                    assert!(e.message.contains("SHAPE_MISMATCH"));
                }
                other => panic!("expected pipeline error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_mask_is_skip() {
        let calc = GreennessCalculator::new(GreennessMethod::Exg);
        let patch = RgbImage::from_pixel(2, 2, Rgb([60, 140, 40]));
        let err = calc.compute(&patch, &GrayImage::new(2, 2)).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }
}
