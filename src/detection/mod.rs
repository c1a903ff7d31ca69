//! Reference chart detection module
//!
//! This module locates the color chart in each image and reads the measured
//! colors of its swatches for calibration.

pub mod chart;
pub mod homography;

pub use chart::QuadChartDetector;
