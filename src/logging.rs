//! Log setup for the command-line tool
//!
//! Events go to stderr and to a `run.log` file. The level filter is read from
//! `RUST_LOG` and defaults to `info`.

use crate::error::{AnalysisError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Name of the log file written next to the CSV export
pub const LOG_FILE_NAME: &str = "run.log";

/// Log file location for a given CSV export path
pub fn log_path_for(output_csv: &Path) -> PathBuf {
    output_csv
        .parent()
        .unwrap_or(Path::new(""))
        .join(LOG_FILE_NAME)
}

/// Install the global subscriber writing to stderr and `log_path`
pub fn init_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()
        .map_err(|e| AnalysisError::ProcessingError(format!("Failed to install logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_sits_next_to_csv() {
        assert_eq!(
            log_path_for(Path::new("out/results.csv")),
            PathBuf::from("out/run.log")
        );
        assert_eq!(log_path_for(Path::new("results.csv")), PathBuf::from("run.log"));
    }
}
