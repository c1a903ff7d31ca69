//! Color conversion and greenness index module
//!
//! This module holds the sRGB/HSV conversions shared by the stages and the
//! greenness index calculators applied to each patch.

pub mod conversion;
pub mod greenness;

pub use greenness::GreennessCalculator;
