//! Color calibration module
//!
//! Maps the colors measured on the reference chart onto the chart's known
//! values so that greenness is computed on comparable colors across images
//! taken under different light.

pub mod color_correction;

pub use color_correction::ChartCalibrator;
