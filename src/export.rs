//! CSV export of measurements
//!
//! One row per measurement, in accumulation order, under a fixed header.

use crate::error::Result;
use crate::stages::ResultWriter;
use crate::types::Measurement;
use std::fs;
use std::path::PathBuf;

/// Column names of the export, in order
pub const CSV_HEADER: [&str; 10] = [
    "folder_name",
    "image_path",
    "lat",
    "long",
    "patch_id",
    "x",
    "y",
    "w",
    "h",
    "greenness_value",
];

/// Writes all measurements of a run to a single CSV file
#[derive(Debug, Clone)]
pub struct CsvResultWriter {
    output_path: PathBuf,
}

impl CsvResultWriter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl ResultWriter for CsvResultWriter {
    fn write_all(&mut self, measurements: Vec<Measurement>) -> Result<()> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.output_path)?;
        writer.write_record(CSV_HEADER)?;
        for m in &measurements {
            let r = &m.patch_region;
            writer.write_record([
                m.folder_name.clone(),
                m.image_path.display().to_string(),
                m.lat.to_string(),
                m.long.to_string(),
                m.patch_id.to_string(),
                r.x.to_string(),
                r.y.to_string(),
                r.w.to_string(),
                r.h.to_string(),
                m.greenness_value.to_string(),
            ])?;
        }
        writer.flush()?;

        tracing::debug!(rows = measurements.len(), path = %self.output_path.display(), "CSV written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatchRegion, Sample};

    fn measurement(patch_id: u32, value: f64) -> Measurement {
        let sample = Sample {
            path: PathBuf::from("ImageData/plot1/10_00_01_1.jpg"),
            root_path: PathBuf::from("ImageData/plot1"),
            folder_name: "plot1".to_string(),
            lat: 46.5,
            long: 6.6,
        };
        Measurement::new(&sample, PatchRegion { x: 4, y: 8, w: 16, h: 16, patch_id }, value)
    }

    #[test]
    fn test_writes_header_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.csv");
        let mut writer = CsvResultWriter::new(&path);
        writer
            .write_all(vec![measurement(0, 0.25), measurement(1, -0.5)])
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "folder_name,image_path,lat,long,patch_id,x,y,w,h,greenness_value");
        assert_eq!(lines[1], "plot1,ImageData/plot1/10_00_01_1.jpg,46.5,6.6,0,4,8,16,16,0.25");
        assert_eq!(lines[2], "plot1,ImageData/plot1/10_00_01_1.jpg,46.5,6.6,1,4,8,16,16,-0.5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        let mut m = measurement(0, 1.0);
        m.folder_name = "plot, north".to_string();
        CsvResultWriter::new(&path).write_all(vec![m]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "plot, north");
        assert_eq!(&row[9], "1");
    }
}
