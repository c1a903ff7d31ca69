//! Per-pixel vegetation tests
//!
//! Each function maps a display-encoded RGB image to a 0/255 mask of the same
//! size. Thresholds are on the 0-255 channel scale unless noted.

use crate::color::conversion::rgb8_to_hsv;
use image::{GrayImage, Luma, RgbImage};

const FG: Luma<u8> = Luma([255]);
const BG: Luma<u8> = Luma([0]);

fn threshold_map(image: &RgbImage, test: impl Fn([u8; 3]) -> bool) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(mask.pixels_mut()) {
        *dst = if test(src.0) { FG } else { BG };
    }
    mask
}

/// Normalized excess green `2g - r - b` on chromaticity coordinates
pub fn nexg_mask(image: &RgbImage, threshold: f32) -> GrayImage {
    threshold_map(image, |p| {
        let [r, g, b] = p.map(f32::from);
        let sum = r + g + b + 1e-6;
        let nexg = (2.0 * g - r - b) / sum;
        nexg > threshold
    })
}

/// Excess green `2G - R - B`
pub fn exg_mask(image: &RgbImage, threshold: f32) -> GrayImage {
    threshold_map(image, |p| {
        let [r, g, b] = p.map(f32::from);
        2.0 * g - r - b > threshold
    })
}

/// Hue within `hue_range` (degrees, inclusive), saturation and value above minimums
pub fn hsv_mask(image: &RgbImage, hue_range: (f32, f32), s_min: u8, v_min: u8) -> GrayImage {
    threshold_map(image, |p| {
        let (h, s, v) = rgb8_to_hsv(p);
        h >= hue_range.0 && h <= hue_range.1 && s >= s_min as f32 && v >= v_min as f32
    })
}
