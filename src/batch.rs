//! Batch orchestration
//!
//! [`BatchProcessor`] is the only place where stage failures are recovered.
//! It walks the discovered samples in order, feeds each one to the pipeline
//! and decides from the error severity whether to go on:
//!
//! - fatal: stop; measurements gathered so far are still exported
//! - skip / warning: drop the sample and continue
//! - unclassified (any other error, or a panic inside a stage): log and continue
//!
//! The writer is called once at the end, and only if there is something to
//! write.

use crate::constants::batch::PROGRESS_INTERVAL;
use crate::error::{AnalysisError, PipelineError, Result, Severity};
use crate::pipeline::ImageAnalysisPipeline;
use crate::stages::{DatasetDiscovery, ResultWriter};
use crate::types::{Measurement, Sample};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    /// Every sample was visited
    Completed,
    /// A fatal error on the sample at `sample_index` ended the run
    Stopped {
        sample_index: usize,
        stage: &'static str,
        message: String,
    },
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub status: BatchStatus,
    /// Samples returned by discovery
    pub discovered: usize,
    /// Samples handed to the pipeline
    pub attempted: usize,
    /// Samples that produced measurements
    pub succeeded: usize,
    pub skipped: usize,
    pub warnings: usize,
    /// Samples dropped because of an unclassified error or panic
    pub unexpected: usize,
    /// Measurements handed to the writer
    pub measurements: usize,
    /// Whether the writer was called
    pub exported: bool,
}

impl BatchReport {
    fn new(discovered: usize) -> Self {
        Self {
            status: BatchStatus::Completed,
            discovered,
            attempted: 0,
            succeeded: 0,
            skipped: 0,
            warnings: 0,
            unexpected: 0,
            measurements: 0,
            exported: false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

/// Drives discovery, the pipeline and export for one run
pub struct BatchProcessor<'a> {
    discovery: &'a mut dyn DatasetDiscovery,
    pipeline: &'a ImageAnalysisPipeline,
    writer: &'a mut dyn ResultWriter,
    progress_interval: usize,
    max_samples: Option<usize>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        discovery: &'a mut dyn DatasetDiscovery,
        pipeline: &'a ImageAnalysisPipeline,
        writer: &'a mut dyn ResultWriter,
    ) -> Self {
        Self {
            discovery,
            pipeline,
            writer,
            progress_interval: PROGRESS_INTERVAL,
            max_samples: None,
        }
    }

    /// Log progress every `interval` samples
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Process at most `limit` samples, in discovery order
    pub fn with_max_samples(mut self, limit: Option<usize>) -> Self {
        self.max_samples = limit;
        self
    }

    /// Run the whole batch rooted at `root`
    ///
    /// Errors are returned only for discovery and export failures; per-sample
    /// failures are reflected in the report.
    pub fn run(&mut self, root: &Path) -> Result<BatchReport> {
        let samples = self.discovery.discover(root)?;
        let mut report = BatchReport::new(samples.len());
        let limit = self.max_samples.unwrap_or(samples.len()).min(samples.len());
        tracing::info!("{} samples read; starting analysis.", samples.len());
        if limit < samples.len() {
            tracing::info!("Limiting run to the first {limit} samples.");
        }

        let mut accumulated: Vec<Measurement> = Vec::new();
        for (index, sample) in samples.iter().take(limit).enumerate() {
            report.attempted += 1;
            match self.process_guarded(sample, index) {
                Ok(measurements) => {
                    report.succeeded += 1;
                    accumulated.extend(measurements);
                }
                Err(e) => {
                    let recoverable = e.is_recoverable();
                    match e {
                        AnalysisError::Pipeline(e) => {
                            log_classified(&e, sample);
                            if !recoverable {
                                report.status = BatchStatus::Stopped {
                                    sample_index: index,
                                    stage: e.stage,
                                    message: e.message,
                                };
                                break;
                            }
                            match e.severity {
                                Severity::Warning => report.warnings += 1,
                                _ => report.skipped += 1,
                            }
                        }
                        other => {
                            report.unexpected += 1;
                            tracing::error!(error = ?other, "Unexpected error for {}: {other}", sample.id());
                        }
                    }
                }
            }

            if (index + 1) % self.progress_interval == 0 {
                tracing::info!("{}/{} samples processed.", index + 1, limit);
            }
        }

        report.measurements = accumulated.len();
        if !accumulated.is_empty() {
            tracing::info!("Exporting data/results to a CSV file.");
            self.writer.write_all(accumulated)?;
            report.exported = true;
        }
        tracing::info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            warnings = report.warnings,
            unexpected = report.unexpected,
            measurements = report.measurements,
            "Analysis finished."
        );
        Ok(report)
    }

    /// Pipeline call with panics turned into unclassified errors
    fn process_guarded(&self, sample: &Sample, index: usize) -> Result<Vec<Measurement>> {
        let pipeline = self.pipeline;
        panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(sample, index))).unwrap_or_else(
            |payload| {
                Err(AnalysisError::StagePanic {
                    message: panic_message(payload.as_ref()),
                })
            },
        )
    }
}

/// Skips go to `WARN`; warnings and fatal errors go to `ERROR`
fn log_classified(e: &PipelineError, sample: &Sample) {
    let id = e.sample.clone().unwrap_or_else(|| sample.id());
    match e.severity {
        Severity::Skip => tracing::warn!(
            severity = %e.severity,
            "[WARN] at {} step for {}: {}.",
            e.stage,
            id,
            e.message
        ),
        Severity::Warning => tracing::error!(
            severity = %e.severity,
            "[WARNING] at {} step for {}: {}. Sample dropped.",
            e.stage,
            id,
            e.message
        ),
        Severity::Fatal => tracing::error!(
            severity = %e.severity,
            "Fatal error at {} step for {}: {}; stopping the batch.",
            e.stage,
            id,
            e.message
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
