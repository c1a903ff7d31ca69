//! Value types shared by every stage: samples, geometry and measurements.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One source image with its identity and geolocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Image file path
    pub path: PathBuf,
    /// Directory of the image relative to the dataset root's parent
    pub root_path: PathBuf,
    /// Name of the directory containing the image
    pub folder_name: String,
    pub lat: f64,
    pub long: f64,
}

impl Sample {
    /// Identifier used in log lines and error context
    pub fn id(&self) -> String {
        self.path.display().to_string()
    }
}

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Non-empty and inside an image of the given dimensions
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && self.x.checked_add(self.w).is_some_and(|r| r <= width)
            && self.y.checked_add(self.h).is_some_and(|b| b <= height)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let (ax1, ay1) = (self.x as u64 + self.w as u64, self.y as u64 + self.h as u64);
        let (bx1, by1) = (other.x as u64 + other.w as u64, other.y as u64 + other.h as u64);
        (self.x as u64) < bx1 && (other.x as u64) < ax1 && (self.y as u64) < by1 && (other.y as u64) < ay1
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// Rectangle analyzed independently, with its sequence id within the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub patch_id: u32,
}

impl PatchRegion {
    pub fn from_bbox(bbox: BoundingBox, patch_id: u32) -> Self {
        Self {
            x: bbox.x,
            y: bbox.y,
            w: bbox.w,
            h: bbox.h,
            patch_id,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.w, self.h)
    }
}

/// Four corners of the reference chart, clockwise from top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartQuad {
    pub corners: [[i32; 2]; 4],
}

impl ChartQuad {
    pub fn new(corners: [[i32; 2]; 4]) -> Self {
        Self { corners }
    }

    /// Axis-aligned box covering the quad, clipped to the image
    ///
    /// Returns `None` when the quad lies entirely outside the image.
    pub fn bounding_box(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let xs = self.corners.iter().map(|c| c[0]);
        let ys = self.corners.iter().map(|c| c[1]);
        let x0 = xs.clone().min()?.max(0) as i64;
        let x1 = (xs.max()? as i64 + 1).min(width as i64);
        let y0 = ys.clone().min()?.max(0) as i64;
        let y1 = (ys.max()? as i64 + 1).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BoundingBox::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

/// Greenness of one patch of one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub image_path: PathBuf,
    pub folder_name: String,
    pub lat: f64,
    pub long: f64,
    pub patch_id: u32,
    pub patch_region: PatchRegion,
    pub greenness_value: f64,
}

impl Measurement {
    pub fn new(sample: &Sample, patch: PatchRegion, greenness_value: f64) -> Self {
        Self {
            image_path: sample.path.clone(),
            folder_name: sample.folder_name.clone(),
            lat: sample.lat,
            long: sample.long,
            patch_id: patch.patch_id,
            patch_region: patch,
            greenness_value,
        }
    }
}
