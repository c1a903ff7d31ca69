//! Reference values and default thresholds
//!
//! Reference chart colors follow the X-Rite ColorChecker Classic 24 (post
//! November 2014 formulation), listed in reading order from the dark skin
//! swatch at the top-left corner.

/// ColorChecker 24 layout and reference colors
pub mod color_checker {
    /// Swatch columns on the chart
    pub const COLUMNS: usize = 6;

    /// Swatch rows on the chart
    pub const ROWS: usize = 4;

    pub const SWATCH_COUNT: usize = COLUMNS * ROWS;

    /// Reference swatches as 8-bit sRGB (D65)
    pub const REFERENCE_SRGB8: [[u8; 3]; SWATCH_COUNT] = [
        [115, 82, 68],   // dark skin
        [194, 150, 130], // light skin
        [98, 122, 157],  // blue sky
        [87, 108, 67],   // foliage
        [133, 128, 177], // blue flower
        [103, 189, 170], // bluish green
        [214, 126, 44],  // orange
        [80, 91, 166],   // purplish blue
        [193, 90, 99],   // moderate red
        [94, 60, 108],   // purple
        [157, 188, 64],  // yellow green
        [224, 163, 46],  // orange yellow
        [56, 61, 150],   // blue
        [70, 148, 73],   // green
        [175, 54, 60],   // red
        [231, 199, 31],  // yellow
        [187, 86, 149],  // magenta
        [8, 133, 161],   // cyan
        [243, 243, 242], // white 9.5
        [200, 200, 200], // neutral 8
        [160, 160, 160], // neutral 6.5
        [122, 122, 121], // neutral 5
        [85, 85, 85],    // neutral 3.5
        [52, 52, 52],    // black 2
    ];

    /// Fraction of a swatch cell sampled around its center
    pub const SAMPLE_FRACTION: f32 = 0.4;
}

/// Plant segmentation thresholds
pub mod segmentation {
    /// Normalized excess-green threshold (chromaticity units)
    pub const NEXG_THRESHOLD: f32 = 0.1;

    /// Excess-green threshold on the 0-255 scale
    pub const EXG_THRESHOLD: f32 = 0.0;

    /// Accepted hue range in degrees
    pub const HSV_HUE_RANGE: (f32, f32) = (70.0, 170.0);

    /// Minimum saturation on the 0-255 scale
    pub const HSV_SATURATION_MIN: u8 = 40;

    /// Minimum value on the 0-255 scale
    pub const HSV_VALUE_MIN: u8 = 40;

    /// Minimum number of plant pixels left after morphology
    pub const MIN_PLANT_PIXELS: u64 = 40;
}

/// Greenness index pixel filters (0-255 scale)
pub mod greenness {
    /// Pixels with `g + r` at or below this are treated as too dark
    pub const MIN_GREEN_RED_SUM: f32 = 20.0;

    /// Pixels with `|g - r|` at or below this are treated as neutral
    pub const MIN_GREEN_RED_DIFF: f32 = 2.0;

    /// Guards the NGRDI denominator
    pub const NGRDI_EPSILON: f32 = 1e-6;
}

/// Patch selection defaults
pub mod patches {
    /// Patch side as a fraction of the shorter image side
    pub const SIZE_FRACTION: f32 = 0.25;

    /// Window stride as a fraction of the patch side
    pub const STRIDE_FRACTION: f32 = 0.5;

    /// Margin kept around the chart, as a fraction of the patch side
    pub const CHART_MARGIN_FRACTION: f32 = 0.1;

    /// Minimum share of excess-green pixels for a window to be a candidate
    pub const MIN_GREEN_FRACTION: f64 = 0.25;
}

/// Batch defaults
pub mod batch {
    /// Samples between progress log lines
    pub const PROGRESS_INTERVAL: usize = 25;

    /// Samples between saved figures
    pub const FIGURE_SAVE_INTERVAL: usize = 100;
}

/// Discovery defaults
pub mod discovery {
    /// Image extensions picked up by the folder walk
    pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif"];

    /// Path component holding images
    pub const IMAGE_DIR_COMPONENT: &str = "ImageData";

    /// Sibling path component holding the GPS tables
    pub const GPS_DIR_COMPONENT: &str = "GPSData";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_chart_neutrals_are_gray() {
        for rgb in &color_checker::REFERENCE_SRGB8[19..] {
            let spread = rgb.iter().max().unwrap() - rgb.iter().min().unwrap();
            assert!(spread <= 1);
        }
    }

    #[test]
    fn test_threshold_ranges() {
        assert!(segmentation::HSV_HUE_RANGE.0 < segmentation::HSV_HUE_RANGE.1);
        assert!(patches::STRIDE_FRACTION > 0.0 && patches::STRIDE_FRACTION <= 1.0);
        assert!(color_checker::SAMPLE_FRACTION < 1.0);
    }
}
