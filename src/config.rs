//! Configuration structures for a greenness run.
//!
//! All tunable parameters of a run live in [`ProjectConfig`], grouped by the
//! stage they affect. Configuration can be loaded from JSON files or built
//! programmatically (the CLI does the latter and applies flag overrides).
//!
//! ```no_run
//! use canopy_greenness::ProjectConfig;
//! use std::path::Path;
//!
//! let config = ProjectConfig::from_json_file(Path::new("run.json"))?;
//! config.validate()?;
//! # Ok::<(), canopy_greenness::AnalysisError>(())
//! ```

use crate::constants::{batch, patches, segmentation};
use crate::error::{AnalysisError, Result};
use crate::types::ChartQuad;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plant segmentation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationMethod {
    /// Normalized excess green on chromaticity coordinates
    Nexg,
    /// Excess green on raw channel values
    Exg,
    /// Hue/saturation/value thresholding
    Hsv,
    /// Union of region proposals filtered by size and greenness
    Model,
}

/// Greenness index strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GreennessMethod {
    /// Median of `2g - r - b`
    Exg,
    /// Median of `(g - r) / (g + r)`
    Ngrdi,
}

/// Complete configuration of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Dataset root walked by discovery
    pub input_root: PathBuf,

    /// CSV export path; `run.log` is written next to it
    pub output_csv: PathBuf,

    /// Directory for saved figures
    pub output_figure: PathBuf,

    /// Patches requested per image
    #[serde(default = "default_patch_count")]
    pub num_patches_per_image: usize,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default = "default_greenness_method")]
    pub greenness_method: GreennessMethod,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub patches: PatchConfig,

    #[serde(default)]
    pub visualization: VisualizationConfig,

    /// Samples between progress log lines
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,

    /// Process at most this many samples, in discovery order
    #[serde(default)]
    pub max_samples: Option<usize>,
}

/// Segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub method: SegmentationMethod,
    pub nexg_threshold: f32,
    pub exg_threshold: f32,
    /// Accepted hue range in degrees
    pub hsv_hue_range: (f32, f32),
    pub hsv_saturation_min: u8,
    pub hsv_value_min: u8,
    /// Minimum plant pixels for a usable mask
    pub min_plant_pixels: u64,
    /// Required by [`SegmentationMethod::Model`]
    pub model: Option<ModelMaskConfig>,
}

/// Mask-proposal segmentation parameters
///
/// Region proposals are filtered by size and by how much of each region
/// passes the HSV plant test before being merged into one mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMaskConfig {
    /// Proposals covering less of the image than this are ignored
    #[serde(default = "default_min_area_frac")]
    pub min_area_frac: f32,
    /// Proposals covering more of the image than this are ignored
    #[serde(default = "default_max_area_frac")]
    pub max_area_frac: f32,
    /// At most this many proposals are merged, greenest first
    #[serde(default = "default_keep_top_k")]
    pub keep_top_k: usize,
    /// Minimum fraction of a proposal passing the HSV plant test
    #[serde(default = "default_green_score_thresh")]
    pub green_score_thresh: f32,
}

/// Where chart corners come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartSource {
    /// JSON annotation next to each image, `<image file name><suffix>`
    Sidecar { suffix: String },
    /// Same corners for every image (fixed camera rig)
    Fixed { quad: ChartQuad },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub source: ChartSource,
    /// Fraction of each swatch cell averaged around its center
    pub sample_fraction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Patch side as a fraction of the shorter image side
    pub size_fraction: f32,
    /// Candidate stride as a fraction of the patch side
    pub stride_fraction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub enabled: bool,
    /// Save a figure for every Nth sample
    pub save_interval: usize,
}

fn default_patch_count() -> usize {
    1
}

fn default_greenness_method() -> GreennessMethod {
    GreennessMethod::Ngrdi
}

fn default_progress_interval() -> usize {
    batch::PROGRESS_INTERVAL
}

fn default_min_area_frac() -> f32 {
    0.002
}

fn default_max_area_frac() -> f32 {
    0.80
}

fn default_keep_top_k() -> usize {
    12
}

fn default_green_score_thresh() -> f32 {
    0.15
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            method: SegmentationMethod::Nexg,
            nexg_threshold: segmentation::NEXG_THRESHOLD,
            exg_threshold: segmentation::EXG_THRESHOLD,
            hsv_hue_range: segmentation::HSV_HUE_RANGE,
            hsv_saturation_min: segmentation::HSV_SATURATION_MIN,
            hsv_value_min: segmentation::HSV_VALUE_MIN,
            min_plant_pixels: segmentation::MIN_PLANT_PIXELS,
            model: None,
        }
    }
}

impl Default for ModelMaskConfig {
    fn default() -> Self {
        Self {
            min_area_frac: default_min_area_frac(),
            max_area_frac: default_max_area_frac(),
            keep_top_k: default_keep_top_k(),
            green_score_thresh: default_green_score_thresh(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            source: ChartSource::Sidecar {
                suffix: ".chart.json".to_string(),
            },
            sample_fraction: crate::constants::color_checker::SAMPLE_FRACTION,
        }
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            size_fraction: patches::SIZE_FRACTION,
            stride_fraction: patches::STRIDE_FRACTION,
        }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            save_interval: batch::FIGURE_SAVE_INTERVAL,
        }
    }
}

impl ProjectConfig {
    /// Configuration with defaults for everything but the paths
    pub fn new(input_root: impl Into<PathBuf>, output_csv: impl Into<PathBuf>) -> Self {
        let output_csv = output_csv.into();
        let output_figure = output_csv
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            input_root: input_root.into(),
            output_csv,
            output_figure,
            num_patches_per_image: default_patch_count(),
            segmentation: SegmentationConfig::default(),
            greenness_method: default_greenness_method(),
            chart: ChartConfig::default(),
            patches: PatchConfig::default(),
            visualization: VisualizationConfig::default(),
            progress_interval: default_progress_interval(),
            max_samples: None,
        }
    }

    /// Reject values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.num_patches_per_image == 0 {
            return Err(AnalysisError::invalid_parameter("num_patches_per_image", 0));
        }
        if self.progress_interval == 0 {
            return Err(AnalysisError::invalid_parameter("progress_interval", 0));
        }
        if self.visualization.save_interval == 0 {
            return Err(AnalysisError::invalid_parameter("visualization.save_interval", 0));
        }
        let size = self.patches.size_fraction;
        if !(size > 0.0 && size <= 1.0) {
            return Err(AnalysisError::invalid_parameter("patches.size_fraction", size));
        }
        let stride = self.patches.stride_fraction;
        if !(stride > 0.0 && stride <= 1.0) {
            return Err(AnalysisError::invalid_parameter("patches.stride_fraction", stride));
        }
        let sample = self.chart.sample_fraction;
        if !(sample > 0.0 && sample <= 1.0) {
            return Err(AnalysisError::invalid_parameter("chart.sample_fraction", sample));
        }
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
