//! Error types for the canopy_greenness library
//!
//! Two layers live here. [`PipelineError`] is the severity-classified failure a
//! stage raises for a single sample; the batch orchestrator inspects its
//! [`Severity`] to decide whether to continue. [`AnalysisError`] is the
//! crate-wide error that wraps it together with everything else that can go
//! wrong (I/O, decoding, export, configuration).

use std::fmt;
use thiserror::Error;

/// Result type alias for canopy_greenness operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// How a per-sample failure affects the rest of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Stop processing further samples
    Fatal,
    /// Drop this sample and continue
    Skip,
    /// Drop this sample, continue, and log prominently
    Warning,
}

impl Severity {
    /// Whether the batch may continue after a failure of this severity
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Severity::Fatal)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Skip => "skip",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity-classified failure raised by a pipeline stage
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage}: {message}")]
pub struct PipelineError {
    /// Human-readable description
    pub message: String,
    /// Name of the stage that raised the error
    pub stage: &'static str,
    /// Identifier of the sample being processed, when known
    pub sample: Option<String>,
    /// Control-flow classification
    pub severity: Severity,
}

impl PipelineError {
    pub fn new(stage: &'static str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            stage,
            sample: None,
            severity,
        }
    }

    /// Recoverable failure: the sample is dropped
    pub fn skip(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, Severity::Skip)
    }

    /// Recoverable failure worth drawing attention to
    pub fn warning(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, Severity::Warning)
    }

    /// Unrecoverable failure: the batch stops
    pub fn fatal(stage: &'static str, message: impl Into<String>) -> Self {
        Self::new(stage, message, Severity::Fatal)
    }

    /// Attach the sample identifier if none was set by the raising stage
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        if self.sample.is_none() {
            self.sample = Some(sample.into());
        }
        self
    }
}

/// Comprehensive error types for greenness analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Severity-classified stage failure
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Image file could not be loaded, decoded or encoded
    #[error("Failed to load image: {message}")]
    ImageLoadError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// EXIF metadata extraction failed
    #[error("EXIF processing error: {message}")]
    ExifError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// GPS table could not be read or parsed
    #[error("GPS data error for {path}: {reason}")]
    GpsDataError { path: String, reason: String },

    /// Invalid configuration value
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// A stage panicked while processing a sample
    #[error("Stage panicked: {message}")]
    StagePanic { message: String },

    /// Generic processing error
    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalysisError {
    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoadError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an EXIF processing error with context
    pub fn exif<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ExifError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Severity of a classified failure, `None` for unclassified errors
    pub fn severity(&self) -> Option<Severity> {
        match self {
            AnalysisError::Pipeline(e) => Some(e.severity),
            _ => None,
        }
    }

    /// Check if the batch may continue after this error
    ///
    /// Unclassified errors are always recoverable; only an explicit fatal
    /// classification stops a run.
    pub fn is_recoverable(&self) -> bool {
        self.severity().map_or(true, Severity::is_recoverable)
    }
}
