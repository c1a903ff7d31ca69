use canopy_greenness::config::{ChartSource, ModelMaskConfig};
use canopy_greenness::logging::{init_logging, log_path_for};
use canopy_greenness::{run_project, BatchStatus, GreennessMethod, ProjectConfig, SegmentationMethod};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Per-patch canopy greenness for a folder of chart-calibrated field images
#[derive(Parser, Debug)]
#[command(name = "canopy-greenness", version, about)]
struct Cli {
    /// JSON configuration used as the base; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset root (an `ImageData` tree)
    #[arg(long)]
    input_root: Option<PathBuf>,

    /// CSV export path; `run.log` is written next to it
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Figure directory [default: directory of the CSV]
    #[arg(long)]
    output_fig: Option<PathBuf>,

    /// Patches per image
    #[arg(long)]
    num_patches: Option<usize>,

    /// Plant segmentation method
    #[arg(long, value_enum)]
    segment_method: Option<SegmentationMethod>,

    /// Greenness index
    #[arg(long = "green-indx", value_enum)]
    green_index: Option<GreennessMethod>,

    /// Save raw/overlay figures
    #[arg(long)]
    visualize: bool,

    /// Save a figure every N samples
    #[arg(long)]
    save_interval: Option<usize>,

    /// Log progress every N samples
    #[arg(long)]
    progress_interval: Option<usize>,

    /// Process only the first N samples
    #[arg(long)]
    max_samples: Option<usize>,

    /// Suffix of chart corner annotations next to each image
    #[arg(long)]
    chart_suffix: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ProjectConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ProjectConfig::from_json_file(path)?,
            None => {
                let input_root = self.input_root.clone().ok_or("--input-root is required")?;
                let output_csv = self.output_csv.clone().ok_or("--output-csv is required")?;
                ProjectConfig::new(input_root, output_csv)
            }
        };

        if let Some(root) = self.input_root {
            config.input_root = root;
        }
        if let Some(csv) = self.output_csv {
            if self.config.is_none() {
                config.output_figure = csv.parent().map(PathBuf::from).unwrap_or_default();
            }
            config.output_csv = csv;
        }
        if let Some(fig) = self.output_fig {
            config.output_figure = fig;
        }
        if let Some(n) = self.num_patches {
            config.num_patches_per_image = n;
        }
        if let Some(method) = self.segment_method {
            config.segmentation.method = method;
        }
        if config.segmentation.method == SegmentationMethod::Model && config.segmentation.model.is_none() {
            config.segmentation.model = Some(ModelMaskConfig::default());
        }
        if let Some(method) = self.green_index {
            config.greenness_method = method;
        }
        if self.visualize {
            config.visualization.enabled = true;
        }
        if let Some(n) = self.save_interval {
            config.visualization.save_interval = n;
        }
        if let Some(n) = self.progress_interval {
            config.progress_interval = n;
        }
        if self.max_samples.is_some() {
            config.max_samples = self.max_samples;
        }
        if let Some(suffix) = self.chart_suffix {
            config.chart.source = ChartSource::Sidecar { suffix };
        }
        Ok(config)
    }
}

fn run() -> Result<BatchStatus, Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    config.validate()?;
    init_logging(&log_path_for(&config.output_csv))?;

    tracing::info!(
        input = %config.input_root.display(),
        output = %config.output_csv.display(),
        segmentation = ?config.segmentation.method,
        greenness = ?config.greenness_method,
        "Starting greenness run"
    );
    let report = run_project(&config)?;
    Ok(report.status)
}

fn main() -> ExitCode {
    match run() {
        Ok(BatchStatus::Completed) => ExitCode::SUCCESS,
        Ok(BatchStatus::Stopped { .. }) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
