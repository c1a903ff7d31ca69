//! Patch selection
//!
//! Candidate square windows are laid out on a regular grid over the
//! calibrated image. Windows touching the chart (plus a margin) are dropped,
//! and so are windows where too few pixels show excess green.
//!
//! Selection is greedy: the window with the strongest mean excess green comes
//! first, then each next window is the one least similar (cosine similarity of
//! per-channel mean and spread) to those already chosen, never overlapping
//! them. Fewer patches than requested are returned when candidates run out.

use crate::config::PatchConfig;
use crate::constants::patches::{CHART_MARGIN_FRACTION, MIN_GREEN_FRACTION};
use crate::error::Result;
use crate::stages::PatchSelector;
use crate::types::{BoundingBox, ChartQuad, PatchRegion};
use image::RgbImage;

/// Per-window color statistics used for similarity
type Feature = [f64; 6];

struct WindowStats {
    bbox: BoundingBox,
    feature: Feature,
    green_fraction: f64,
}

/// Grid-based, diversity-driven patch selector
#[derive(Debug, Clone)]
pub struct GridPatchSelector {
    size_fraction: f32,
    stride_fraction: f32,
}

impl GridPatchSelector {
    pub fn new(config: &PatchConfig) -> Self {
        Self {
            size_fraction: config.size_fraction,
            stride_fraction: config.stride_fraction,
        }
    }

    /// Patch side in pixels for an image of the given size
    pub fn patch_side(&self, width: u32, height: u32) -> u32 {
        let short = width.min(height);
        ((short as f32 * self.size_fraction).round() as u32).clamp(1, short.max(1))
    }

    /// Candidate windows in row-major order, chart excluded
    pub fn candidates(&self, width: u32, height: u32, chart: &ChartQuad) -> Vec<BoundingBox> {
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let side = self.patch_side(width, height);
        let stride = ((side as f32 * self.stride_fraction).round() as u32).max(1);
        let margin = (side as f32 * CHART_MARGIN_FRACTION).round() as u32;
        let keep_out = chart.bounding_box(width, height).map(|b| {
            let x = b.x.saturating_sub(margin);
            let y = b.y.saturating_sub(margin);
            BoundingBox::new(x, y, b.x + b.w + margin - x, b.y + b.h + margin - y)
        });

        let mut out = Vec::new();
        for y in (0..=height - side).step_by(stride as usize) {
            for x in (0..=width - side).step_by(stride as usize) {
                let window = BoundingBox::new(x, y, side, side);
                if keep_out.map_or(true, |k| !window.intersects(&k)) {
                    out.push(window);
                }
            }
        }
        out
    }
}

impl PatchSelector for GridPatchSelector {
    fn select(&self, image: &RgbImage, chart: &ChartQuad, count: usize) -> Result<Vec<PatchRegion>> {
        let (w, h) = image.dimensions();
        let windows: Vec<WindowStats> = self
            .candidates(w, h, chart)
            .into_iter()
            .map(|b| window_stats(image, b))
            .filter(|s| s.green_fraction >= MIN_GREEN_FRACTION)
            .collect();
        if count == 0 || windows.is_empty() {
            return Ok(Vec::new());
        }

        // Strongest excess green first; ties go to the earliest window
        let first = (0..windows.len())
            .min_by(|&a, &b| {
                excess_green(&windows[b].feature).total_cmp(&excess_green(&windows[a].feature))
            })
            .unwrap_or(0);
        let mut chosen = vec![first];

        while chosen.len() < count {
            let next = (0..windows.len())
                .filter(|i| !chosen.contains(i))
                .filter(|&i| chosen.iter().all(|&c| !windows[i].bbox.intersects(&windows[c].bbox)))
                .map(|i| {
                    let worst = chosen
                        .iter()
                        .map(|&c| cosine_similarity(&windows[i].feature, &windows[c].feature))
                        .fold(f64::NEG_INFINITY, f64::max);
                    (i, worst)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            match next {
                Some((i, _)) => chosen.push(i),
                None => break,
            }
        }

        if chosen.len() < count {
            tracing::debug!(requested = count, selected = chosen.len(), "fewer patches than requested");
        }

        Ok(chosen
            .into_iter()
            .enumerate()
            .map(|(id, i)| PatchRegion::from_bbox(windows[i].bbox, id as u32))
            .collect())
    }
}

fn window_stats(image: &RgbImage, bbox: BoundingBox) -> WindowStats {
    let mut sum = [0.0f64; 3];
    let mut sq = [0.0f64; 3];
    let mut green = 0u64;
    for y in bbox.y..bbox.y + bbox.h {
        for x in bbox.x..bbox.x + bbox.w {
            let [r, g, b] = image.get_pixel(x, y).0.map(f64::from);
            if 2.0 * g - r - b > 0.0 {
                green += 1;
            }
            for (c, v) in [r, g, b].into_iter().enumerate() {
                sum[c] += v;
                sq[c] += v * v;
            }
        }
    }
    let n = bbox.area().max(1) as f64;
    let mut feature = [0.0; 6];
    for c in 0..3 {
        let mean = sum[c] / n;
        feature[c] = mean;
        feature[3 + c] = (sq[c] / n - mean * mean).max(0.0).sqrt();
    }
    WindowStats {
        bbox,
        feature,
        green_fraction: green as f64 / n,
    }
}

fn excess_green(f: &Feature) -> f64 {
    2.0 * f[1] - f[0] - f[2]
}

fn cosine_similarity(a: &Feature, b: &Feature) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        // Black windows count as identical to everything
        return 1.0;
    }
    dot / (na * nb)
}
