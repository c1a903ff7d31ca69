//! Per-sample analysis pipeline
//!
//! [`ImageAnalysisPipeline::process`] runs the fixed stage sequence on one
//! sample and returns one [`Measurement`] per selected patch:
//!
//! 1. load the raw image (kept for figures)
//! 2. detect the reference chart, producing the normalized image and swatches
//! 3. segment plants on the normalized image
//! 4. calibrate colors against the chart
//! 5. select patches on the calibrated image
//! 6. compute the greenness index of each patch through the plant mask
//! 7. record the raw/overlay figure on the configured interval
//!
//! Stages never see each other; failures propagate unchanged except that
//! classified errors are tagged with the sample identifier.

use crate::calibration::ChartCalibrator;
use crate::color::GreennessCalculator;
use crate::config::ProjectConfig;
use crate::detection::QuadChartDetector;
use crate::error::{AnalysisError, PipelineError, Result};
use crate::image_loader::ImageCrateLoader;
use crate::patches::GridPatchSelector;
use crate::segmentation::PlantSegmentor;
use crate::stages::{
    Calibrator, ChartDetector, FigureSink, ImageLoader, IndexCalculator, PatchSelector, Segmentor,
};
use crate::types::{Measurement, Sample};
use crate::visualization::FigureWriter;
use image::imageops;

const STAGE: &str = "Pipeline";

/// Figure output settings of a pipeline
pub struct Visualization {
    pub sink: Box<dyn FigureSink>,
    /// Record every Nth sample, counted by batch ordinal
    pub save_interval: usize,
}

/// Stage composition for one sample
pub struct ImageAnalysisPipeline {
    loader: Box<dyn ImageLoader>,
    detector: Box<dyn ChartDetector>,
    segmentor: Box<dyn Segmentor>,
    calibrator: Box<dyn Calibrator>,
    selector: Box<dyn PatchSelector>,
    index: Box<dyn IndexCalculator>,
    patches_per_image: usize,
    visualization: Option<Visualization>,
}

impl ImageAnalysisPipeline {
    /// Pipeline from explicit stages, without figure output
    pub fn new(
        loader: Box<dyn ImageLoader>,
        detector: Box<dyn ChartDetector>,
        segmentor: Box<dyn Segmentor>,
        calibrator: Box<dyn Calibrator>,
        selector: Box<dyn PatchSelector>,
        index: Box<dyn IndexCalculator>,
        patches_per_image: usize,
    ) -> Self {
        Self {
            loader,
            detector,
            segmentor,
            calibrator,
            selector,
            index,
            patches_per_image,
            visualization: None,
        }
    }

    /// Pipeline with the crate's concrete stages configured from `config`
    pub fn from_config(config: &ProjectConfig) -> Self {
        let pipeline = Self::new(
            Box::new(ImageCrateLoader),
            Box::new(QuadChartDetector::new(&config.chart)),
            Box::new(PlantSegmentor::new(config.segmentation.clone())),
            Box::new(ChartCalibrator::new()),
            Box::new(GridPatchSelector::new(&config.patches)),
            Box::new(GreennessCalculator::new(config.greenness_method)),
            config.num_patches_per_image,
        );
        if config.visualization.enabled {
            pipeline.with_visualization(
                Box::new(FigureWriter::new(&config.output_figure)),
                config.visualization.save_interval,
            )
        } else {
            pipeline
        }
    }

    pub fn with_visualization(mut self, sink: Box<dyn FigureSink>, save_interval: usize) -> Self {
        self.visualization = Some(Visualization {
            sink,
            save_interval: save_interval.max(1),
        });
        self
    }

    /// Analyze one sample; `ordinal` is its zero-based position in the batch
    pub fn process(&self, sample: &Sample, ordinal: usize) -> Result<Vec<Measurement>> {
        self.run_stages(sample, ordinal).map_err(|e| match e {
            AnalysisError::Pipeline(p) => p.with_sample(sample.id()).into(),
            other => other,
        })
    }

    fn run_stages(&self, sample: &Sample, ordinal: usize) -> Result<Vec<Measurement>> {
        let raw = self.loader.load(&sample.path)?;
        let chart = self.detector.detect(&sample.path)?;
        let segmentation = self.segmentor.segment(&chart.normalized, &chart.quad)?;
        let calibrated = self.calibrator.calibrate(&chart.normalized, &chart.swatches)?;

        if segmentation.mask.dimensions() != calibrated.dimensions() {
            return Err(PipelineError::skip(
                STAGE,
                format!(
                    "Mask is {:?} but calibrated image is {:?}",
                    segmentation.mask.dimensions(),
                    calibrated.dimensions()
                ),
            )
            .into());
        }

        let patches = self
            .selector
            .select(&calibrated, &chart.quad, self.patches_per_image)?;
        let (width, height) = calibrated.dimensions();

        let mut measurements = Vec::with_capacity(patches.len());
        for patch in patches {
            if !patch.bbox().fits(width, height) {
                return Err(PipelineError::skip(
                    STAGE,
                    format!("Patch {} {:?} lies outside the image", patch.patch_id, patch.bbox()),
                )
                .into());
            }
            let crop = imageops::crop_imm(&calibrated, patch.x, patch.y, patch.w, patch.h).to_image();
            let mask = imageops::crop_imm(&segmentation.mask, patch.x, patch.y, patch.w, patch.h).to_image();
            let value = self.index.compute(&crop, &mask)?;
            if !value.is_finite() {
                return Err(PipelineError::skip(
                    STAGE,
                    format!("Patch {} has non-finite greenness {value}", patch.patch_id),
                )
                .into());
            }
            measurements.push(Measurement::new(sample, patch, value));
        }

        if let Some(vis) = &self.visualization {
            if ordinal % vis.save_interval == 0 {
                if let Err(e) = vis.sink.record(sample, &raw, &segmentation.overlay) {
                    tracing::warn!(sample = %sample.id(), "figure not saved: {e}");
                }
            }
        }

        tracing::debug!(sample = %sample.id(), patches = measurements.len(), "sample analyzed");
        Ok(measurements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Severity;
    use crate::stages::{ChartDetection, Segmentation};
    use crate::types::{ChartQuad, PatchRegion};
    use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
    use std::cell::Cell;
    use std::path::{Path, PathBuf};
    use std::rc::Rc;

    struct Loader;
    impl ImageLoader for Loader {
        fn load(&self, _: &Path) -> Result<RgbImage> {
            Ok(RgbImage::new(20, 10))
        }
    }

    struct Detector;
    impl ChartDetector for Detector {
        fn detect(&self, _: &Path) -> Result<ChartDetection> {
            Ok(ChartDetection {
                normalized: Rgb32FImage::from_pixel(20, 10, Rgb([0.1, 0.5, 0.1])),
                swatches: vec![[0.5; 3]; 24],
                quad: ChartQuad::new([[0, 0], [2, 0], [2, 2], [0, 2]]),
            })
        }
    }

    struct Segment {
        mask_size: (u32, u32),
    }
    impl Segmentor for Segment {
        fn segment(&self, _: &Rgb32FImage, _: &ChartQuad) -> Result<Segmentation> {
            let (w, h) = self.mask_size;
            Ok(Segmentation {
                mask: GrayImage::from_pixel(w, h, Luma([255])),
                overlay: RgbImage::new(w, h),
            })
        }
    }

    struct Calibrate;
    impl Calibrator for Calibrate {
        fn calibrate(&self, image: &Rgb32FImage, _: &[[f32; 3]]) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(image.width(), image.height(), Rgb([40, 160, 50])))
        }
    }

    struct Select(Vec<PatchRegion>);
    impl PatchSelector for Select {
        fn select(&self, _: &RgbImage, _: &ChartQuad, count: usize) -> Result<Vec<PatchRegion>> {
            Ok(self.0.iter().copied().take(count).collect())
        }
    }

    /// Reports the patch area so tests can see which crop was used
    struct Area;
    impl IndexCalculator for Area {
        fn compute(&self, patch: &RgbImage, mask: &GrayImage) -> Result<f64> {
            assert_eq!(patch.dimensions(), mask.dimensions());
            Ok((patch.width() * patch.height()) as f64)
        }
    }

    struct CountingSink(Rc<Cell<usize>>);
    impl FigureSink for CountingSink {
        fn record(&self, _: &Sample, _: &RgbImage, _: &RgbImage) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Err(AnalysisError::ProcessingError("disk full".to_string()))
        }
    }

    fn patch(x: u32, y: u32, w: u32, h: u32, id: u32) -> PatchRegion {
        PatchRegion { x, y, w, h, patch_id: id }
    }

    fn pipeline(mask_size: (u32, u32), patches: Vec<PatchRegion>, count: usize) -> ImageAnalysisPipeline {
        ImageAnalysisPipeline::new(
            Box::new(Loader),
            Box::new(Detector),
            Box::new(Segment { mask_size }),
            Box::new(Calibrate),
            Box::new(Select(patches)),
            Box::new(Area),
            count,
        )
    }

    fn sample() -> Sample {
        Sample {
            path: PathBuf::from("plot/img_1.jpg"),
            root_path: PathBuf::from("plot"),
            folder_name: "plot".to_string(),
            lat: 1.0,
            long: 2.0,
        }
    }

    #[test]
    fn test_one_measurement_per_patch() {
        let p = pipeline((20, 10), vec![patch(4, 2, 4, 4, 0), patch(10, 2, 6, 5, 1)], 3);
        let out = p.process(&sample(), 0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].patch_id, 0);
        assert_eq!(out[0].greenness_value, 16.0);
        assert_eq!(out[1].greenness_value, 30.0);
        assert_eq!(out[1].lat, 1.0);
        assert_eq!(out[1].folder_name, "plot");
    }

    #[test]
    fn test_patch_count_is_forwarded() {
        let p = pipeline((20, 10), vec![patch(0, 5, 2, 2, 0), patch(4, 5, 2, 2, 1)], 1);
        assert_eq!(p.process(&sample(), 0).unwrap().len(), 1);
    }

    #[test]
    fn test_mask_size_mismatch_is_skip() {
        let p = pipeline((19, 10), vec![patch(4, 2, 4, 4, 0)], 1);
        let err = p.process(&sample(), 0).unwrap_err();
        match err {
            AnalysisError::Pipeline(e) => {
                assert_eq!(e.severity, Severity::Skip);
                assert_eq!(e.sample.as_deref(), Some("plot/img_1.jpg"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_patch_outside_image_is_skip() {
        let p = pipeline((20, 10), vec![patch(18, 2, 4, 4, 0)], 1);
        let err = p.process(&sample(), 0).unwrap_err();
        assert_eq!(err.severity(), Some(Severity::Skip));
    }

    struct Failing;
    impl IndexCalculator for Failing {
        fn compute(&self, _: &RgbImage, _: &GrayImage) -> Result<f64> {
            Err(PipelineError::skip("Greenness", "No vegetation pixels").into())
        }
    }

    #[test]
    fn test_no_figure_for_dropped_sample() {
        let calls = Rc::new(Cell::new(0));
        let p = ImageAnalysisPipeline::new(
            Box::new(Loader),
            Box::new(Detector),
            Box::new(Segment { mask_size: (20, 10) }),
            Box::new(Calibrate),
            Box::new(Select(vec![patch(4, 2, 4, 4, 0)])),
            Box::new(Failing),
            1,
        )
        .with_visualization(Box::new(CountingSink(calls.clone())), 1);

        assert!(p.process(&sample(), 0).is_err());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_figure_errors_do_not_fail_sample() {
        let calls = Rc::new(Cell::new(0));
        let p = pipeline((20, 10), vec![patch(4, 2, 4, 4, 0)], 1)
            .with_visualization(Box::new(CountingSink(calls.clone())), 2);
        for ordinal in 0..5 {
            assert_eq!(p.process(&sample(), ordinal).unwrap().len(), 1);
        }
        // ordinals 0, 2 and 4
        assert_eq!(calls.get(), 3);
    }
}
