//! Plant segmentation module
//!
//! [`PlantSegmentor`] turns the normalized image into a binary plant mask:
//!
//! 1. per-pixel vegetation test for the configured [`SegmentationMethod`]
//! 2. chart quadrilateral filled with background
//! 3. morphological clean-up (open, close ×2, erode, dilate ×2, 3×3 kernel)
//! 4. overlay of the display image through the mask
//! 5. minimum plant area check

pub mod proposals;
pub mod threshold;

use crate::color::conversion::encode_display;
use crate::config::{SegmentationConfig, SegmentationMethod};
use crate::error::{PipelineError, Result};
use crate::stages::{Segmentation, Segmentor};
use crate::types::ChartQuad;
use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::morphology::{close, dilate, erode, open};
use imageproc::point::Point;

const STAGE: &str = "Leaf Segmentor";

/// Segmentor for a method fixed at construction
#[derive(Debug, Clone)]
pub struct PlantSegmentor {
    config: SegmentationConfig,
}

impl PlantSegmentor {
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    fn raw_mask(&self, display: &RgbImage) -> Result<GrayImage> {
        let c = &self.config;
        let mask = match c.method {
            SegmentationMethod::Nexg => threshold::nexg_mask(display, c.nexg_threshold),
            SegmentationMethod::Exg => threshold::exg_mask(display, c.exg_threshold),
            SegmentationMethod::Hsv => {
                threshold::hsv_mask(display, c.hsv_hue_range, c.hsv_saturation_min, c.hsv_value_min)
            }
            SegmentationMethod::Model => {
                let model = c.model.as_ref().ok_or_else(|| {
                    PipelineError::fatal(STAGE, "Model segmentation config can not be None")
                })?;
                proposals::proposal_mask(display, c, model)
            }
        };
        Ok(mask)
    }
}

impl Segmentor for PlantSegmentor {
    fn segment(&self, image: &Rgb32FImage, chart: &ChartQuad) -> Result<Segmentation> {
        let display = encode_display(image);

        let mut mask = self.raw_mask(&display)?;
        exclude_chart(&mut mask, chart);
        let mask = clean_mask(&mask);
        let overlay = overlay(&display, &mask);

        let plant_pixels = mask.pixels().filter(|p| p.0[0] > 0).count() as u64;
        tracing::debug!(plant_pixels, method = ?self.config.method, "plant mask");
        if plant_pixels < self.config.min_plant_pixels {
            return Err(PipelineError::skip(STAGE, "No leaf detected").into());
        }

        Ok(Segmentation { mask, overlay })
    }
}

/// Fill the chart quadrilateral with background
pub fn exclude_chart(mask: &mut GrayImage, chart: &ChartQuad) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(4);
    for c in chart.corners {
        let p = Point::new(c[0], c[1]);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    match poly.len() {
        0 => {}
        1 => {
            let p = poly[0];
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
                mask.put_pixel(p.x as u32, p.y as u32, Luma([0]));
            }
        }
        _ => draw_polygon_mut(mask, &poly, Luma([0])),
    }
}

/// Speckle removal and hole filling
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let opened = open(mask, Norm::LInf, 1);
    let closed = close(&opened, Norm::LInf, 2);
    let eroded = erode(&closed, Norm::LInf, 1);
    dilate(&eroded, Norm::LInf, 2)
}

/// Display image with non-plant pixels set to black
pub fn overlay(image: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut out = image.clone();
    for (px, m) in out.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            *px = Rgb([0, 0, 0]);
        }
    }
    out
}
