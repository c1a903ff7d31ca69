//! # Canopy Greenness
//!
//! A Rust crate for measuring canopy greenness from field photographs that
//! include a reference color chart.
//!
//! For every image of a dataset this library:
//! - Locates the ColorChecker chart and reads its swatches
//! - Segments plant material, with the chart region excluded
//! - Color-corrects the frame against the chart's known colors
//! - Splits the frame into patches and computes a greenness index per patch
//!
//! A batch run discovers geo-tagged images, processes them in order with
//! severity-classified error handling, and exports one CSV row per patch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use canopy_greenness::{run_project, ProjectConfig};
//!
//! let config = ProjectConfig::new("data/ImageData", "out/results.csv");
//! let report = run_project(&config)?;
//! println!("{} measurements exported", report.measurements);
//! # Ok::<(), canopy_greenness::AnalysisError>(())
//! ```

pub mod batch;
pub mod calibration;
pub mod color;
pub mod config;
pub mod constants;
pub mod detection;
pub mod discovery;
pub mod error;
pub mod exif;
pub mod export;
pub mod image_loader;
pub mod logging;
pub mod patches;
pub mod pipeline;
pub mod segmentation;
pub mod stages;
pub mod types;
pub mod visualization;

pub use batch::{BatchProcessor, BatchReport, BatchStatus};
pub use config::{GreennessMethod, ProjectConfig, SegmentationMethod};
pub use error::{AnalysisError, PipelineError, Result, Severity};
pub use pipeline::ImageAnalysisPipeline;
pub use stages::{
    Calibrator, ChartDetection, ChartDetector, DatasetDiscovery, FigureSink, ImageLoader,
    IndexCalculator, PatchSelector, ResultWriter, Segmentation, Segmentor,
};
pub use types::{BoundingBox, ChartQuad, Measurement, PatchRegion, Sample};

use discovery::FolderDiscovery;
use export::CsvResultWriter;

/// Run a complete batch with the crate's own stages
///
/// Validates `config`, discovers samples under `config.input_root`, analyzes
/// them and writes the CSV export. Logging is left to the caller.
pub fn run_project(config: &ProjectConfig) -> Result<BatchReport> {
    config.validate()?;

    let pipeline = ImageAnalysisPipeline::from_config(config);
    let mut discovery = FolderDiscovery::new();
    let mut writer = CsvResultWriter::new(&config.output_csv);

    BatchProcessor::new(&mut discovery, &pipeline, &mut writer)
        .with_progress_interval(config.progress_interval)
        .with_max_samples(config.max_samples)
        .run(&config.input_root)
}
