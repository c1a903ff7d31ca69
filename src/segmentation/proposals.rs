//! Region-proposal segmentation
//!
//! Candidate regions are the connected components of a coarse excess-green
//! map. Each proposal is kept when its size is plausible for a plant and a
//! large enough share of its pixels passes the HSV plant test; the greenest
//! `keep_top_k` survivors are merged into the final mask.

use super::threshold::{exg_mask, hsv_mask};
use crate::config::{ModelMaskConfig, SegmentationConfig};
use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, Copy)]
struct Proposal {
    area: u64,
    green: u64,
}

impl Proposal {
    fn green_ratio(&self) -> f32 {
        if self.area == 0 {
            0.0
        } else {
            self.green as f32 / self.area as f32
        }
    }
}

/// Merge of the accepted proposals as a 0/255 mask
pub fn proposal_mask(image: &RgbImage, seg: &SegmentationConfig, model: &ModelMaskConfig) -> GrayImage {
    let (w, h) = image.dimensions();
    let image_area = (w as u64 * h as u64).max(1) as f32;

    let candidates = exg_mask(image, seg.exg_threshold);
    let plant = hsv_mask(
        image,
        seg.hsv_hue_range,
        seg.hsv_saturation_min,
        seg.hsv_value_min,
    );
    let labels = connected_components(&candidates, Connectivity::Eight, Luma([0u8]));

    let mut proposals: HashMap<u32, Proposal> = HashMap::new();
    for (label, green) in labels.pixels().zip(plant.pixels()) {
        let id = label.0[0];
        if id == 0 {
            continue;
        }
        let entry = proposals.entry(id).or_default();
        entry.area += 1;
        if green.0[0] > 0 {
            entry.green += 1;
        }
    }

    let mut accepted: Vec<(u32, Proposal)> = proposals
        .into_iter()
        .filter(|(_, p)| {
            let frac = p.area as f32 / image_area;
            frac >= model.min_area_frac && frac <= model.max_area_frac
        })
        .filter(|(_, p)| p.green_ratio() >= model.green_score_thresh)
        .collect();
    // Label order breaks ties so the result is deterministic
    accepted.sort_by(|a, b| {
        b.1.green_ratio()
            .total_cmp(&a.1.green_ratio())
            .then(a.0.cmp(&b.0))
    });
    accepted.truncate(model.keep_top_k);
    tracing::debug!(kept = accepted.len(), "region proposals accepted");

    let keep: HashSet<u32> = accepted.into_iter().map(|(id, _)| id).collect();
    let mut mask = GrayImage::new(w, h);
    for (label, dst) in labels.pixels().zip(mask.pixels_mut()) {
        if keep.contains(&label.0[0]) {
            *dst = Luma([255]);
        }
    }
    mask
}
