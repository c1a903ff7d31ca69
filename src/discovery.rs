//! Folder-based sample discovery
//!
//! Walks a dataset root recursively and turns every image file into a
//! [`Sample`]. Geolocation comes from a per-folder GPS table found by swapping
//! the `ImageData` path component for `GPSData`; the table is a headerless CSV
//! of `lat,long,time` rows and is read once per folder. Images are matched to
//! rows through the time encoded in their file name (`HH_MM_SS_<n>.jpg` maps to
//! `HH:MM:SS`). Folders without a table fall back to EXIF GPS tags.

use crate::constants::discovery::{GPS_DIR_COMPONENT, IMAGE_DIR_COMPONENT, IMAGE_EXTENSIONS};
use crate::error::{AnalysisError, Result};
use crate::exif::ExifExtractor;
use crate::stages::DatasetDiscovery;
use crate::types::Sample;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// One GPS fix from a folder's table
#[derive(Debug, Clone, PartialEq)]
pub struct GpsRecord {
    pub lat: f64,
    pub long: f64,
    pub time: String,
}

/// Cached geolocation source of one image folder
#[derive(Debug)]
enum FolderGps {
    Table {
        rows: Vec<GpsRecord>,
        /// Row used for the previous image of this folder
        last_index: usize,
    },
    /// No GPS table; positions come from EXIF
    Exif,
    /// The table exists but could not be parsed; its images are dropped
    Unreadable(String),
}

/// Dataset discovery over an `ImageData`/`GPSData` folder layout
#[derive(Debug, Default)]
pub struct FolderDiscovery {
    folders: HashMap<PathBuf, FolderGps>,
}

impl FolderDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    fn sample_for(&mut self, path: &Path, base: &Path) -> Result<Sample> {
        let parent = path.parent().unwrap_or(Path::new(""));
        let folder_name = parent
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let root_path = parent.strip_prefix(base).unwrap_or(parent).to_path_buf();

        let folder = self
            .folders
            .entry(parent.to_path_buf())
            .or_insert_with(|| match read_gps_table(&gps_dir_for(parent)) {
                Ok(Some(rows)) => FolderGps::Table { rows, last_index: 0 },
                Ok(None) => FolderGps::Exif,
                Err(e) => {
                    tracing::error!(folder = %parent.display(), "GPS table not usable: {e}");
                    FolderGps::Unreadable(e.to_string())
                }
            });

        let (lat, long) = match folder {
            FolderGps::Table { rows, last_index } => lookup(rows, last_index, path)?,
            FolderGps::Unreadable(reason) => {
                return Err(AnalysisError::GpsDataError {
                    path: path.display().to_string(),
                    reason: reason.clone(),
                })
            }
            FolderGps::Exif => {
                let position = ExifExtractor::extract_gps(path)?.ok_or_else(|| {
                    AnalysisError::GpsDataError {
                        path: path.display().to_string(),
                        reason: "no GPS table and no EXIF GPS tags".to_string(),
                    }
                })?;
                (position.lat, position.long)
            }
        };

        Ok(Sample {
            path: path.to_path_buf(),
            root_path,
            folder_name,
            lat,
            long,
        })
    }
}

impl DatasetDiscovery for FolderDiscovery {
    fn discover(&mut self, root: &Path) -> Result<Vec<Sample>> {
        let mut files = Vec::new();
        walk(root, &mut files)?;
        let base = root.parent().unwrap_or(root).to_path_buf();

        let mut samples = Vec::with_capacity(files.len());
        for path in files {
            match self.sample_for(&path, &base) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::error!(path = %path.display(), "Unexpected error in Dataset Discovery step: {e}");
                }
            }
        }
        tracing::debug!(count = samples.len(), root = %root.display(), "samples discovered");
        Ok(samples)
    }
}

/// Depth-first walk with entries visited in name order
fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if let Err(e) = walk(&path, files) {
                tracing::warn!(dir = %path.display(), "skipping unreadable directory: {e}");
            }
        } else if has_image_extension(&path) {
            files.push(path);
        }
    }
    Ok(())
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// GPS directory paired with an image directory
pub fn gps_dir_for(image_dir: &Path) -> PathBuf {
    image_dir
        .components()
        .map(|c| match c {
            Component::Normal(name) if name == IMAGE_DIR_COMPONENT => {
                Component::Normal(OsStr::new(GPS_DIR_COMPONENT))
            }
            other => other,
        })
        .collect()
}

/// Time key encoded in an image file name
pub fn time_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (prefix, _) = name.rsplit_once('_')?;
    Some(prefix.replace('_', ":"))
}

/// First CSV table of a GPS directory, `None` if there is none
pub fn read_gps_table(dir: &Path) -> Result<Option<Vec<GpsRecord>>> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(None);
    };
    let mut tables: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    tables.sort();
    let Some(csv_path) = tables.into_iter().next() else {
        return Ok(None);
    };

    let gps_error = |reason: String| AnalysisError::GpsDataError {
        path: csv_path.display().to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(&csv_path)?;
    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |i: usize| {
            record
                .get(i)
                .ok_or_else(|| gps_error(format!("row {row} has {} fields, expected 3", record.len())))
        };
        let lat = field(0)?
            .parse::<f64>()
            .map_err(|e| gps_error(format!("row {row}: bad latitude: {e}")))?;
        let long = field(1)?
            .parse::<f64>()
            .map_err(|e| gps_error(format!("row {row}: bad longitude: {e}")))?;
        let time = field(2)?.to_string();
        records.push(GpsRecord { lat, long, time });
    }
    tracing::debug!(path = %csv_path.display(), rows = records.len(), "GPS table loaded");
    Ok(Some(records))
}

/// Position for `path`, reusing the folder's previous row when its time is unknown
fn lookup(table: &[GpsRecord], last_index: &mut usize, path: &Path) -> Result<(f64, f64)> {
    let found = time_key(path).and_then(|key| table.iter().position(|r| r.time == key));
    let index = match found {
        Some(i) => i,
        None => {
            tracing::warn!(
                "[WARN] for {}: Image time is not in GPS data. Last time is used.",
                path.display()
            );
            *last_index
        }
    };
    let record = table.get(index).ok_or_else(|| AnalysisError::GpsDataError {
        path: path.display().to_string(),
        reason: "GPS table is empty".to_string(),
    })?;
    *last_index = index;
    Ok((record.lat, record.long))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"not decoded during discovery").unwrap();
    }

    fn dataset() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("field").join("ImageData").join("plot1");
        let gps = dir.path().join("field").join("GPSData").join("plot1");
        fs::create_dir_all(&gps).unwrap();
        fs::write(
            gps.join("track.csv"),
            "46.50,6.60,10:00:01\n46.51,6.61,10:00:02\n46.52,6.62,10:00:03\n",
        )
        .unwrap();
        touch(&images.join("10_00_02_0001.jpg"));
        touch(&images.join("10_00_01_0002.PNG"));
        touch(&images.join("11_59_59_0003.tif"));
        touch(&images.join("notes.txt"));
        dir
    }

    #[test]
    fn test_time_key() {
        assert_eq!(
            time_key(Path::new("a/10_00_02_0001.jpg")).as_deref(),
            Some("10:00:02")
        );
        assert_eq!(time_key(Path::new("noseparator.jpg")), None);
    }

    #[test]
    fn test_gps_dir_swaps_component() {
        assert_eq!(
            gps_dir_for(Path::new("/data/ImageData/plot1")),
            PathBuf::from("/data/GPSData/plot1")
        );
        assert_eq!(gps_dir_for(Path::new("/data/x")), PathBuf::from("/data/x"));
    }

    #[test]
    fn test_discovery_reads_gps_table() {
        let dir = dataset();
        let root = dir.path().join("field").join("ImageData");
        let samples = FolderDiscovery::new().discover(&root).unwrap();

        assert_eq!(samples.len(), 3);
        let names: Vec<_> = samples
            .iter()
            .map(|s| s.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["10_00_01_0002.PNG", "10_00_02_0001.jpg", "11_59_59_0003.tif"]);

        assert_eq!((samples[0].lat, samples[0].long), (46.50, 6.60));
        assert_eq!((samples[1].lat, samples[1].long), (46.51, 6.61));
        // Unknown time reuses the previous row of the folder
        assert_eq!((samples[2].lat, samples[2].long), (46.51, 6.61));

        assert_eq!(samples[0].folder_name, "plot1");
        assert_eq!(samples[0].root_path, PathBuf::from("ImageData").join("plot1"));
    }

    #[test]
    fn test_files_without_geolocation_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("ImageData").join("10_00_01_1.jpg"));
        let samples = FolderDiscovery::new()
            .discover(&dir.path().join("ImageData"))
            .unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FolderDiscovery::new()
            .discover(&dir.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }

    #[test]
    fn test_unreadable_gps_table_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ImageData");
        let gps = dir.path().join("GPSData");
        fs::create_dir_all(&gps).unwrap();
        fs::write(gps.join("t.csv"), "north,6.6,10:00:01\n").unwrap();
        touch(&root.join("10_00_01_1.jpg"));
        touch(&root.join("10_00_01_2.jpg"));

        let mut discovery = FolderDiscovery::new();
        assert!(discovery.discover(&root).unwrap().is_empty());

        // A repaired table is not re-read by the same discovery
        fs::write(gps.join("t.csv"), "46.5,6.6,10:00:01\n").unwrap();
        assert!(discovery.discover(&root).unwrap().is_empty());
        assert_eq!(FolderDiscovery::new().discover(&root).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_gps_row_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let gps = dir.path().join("GPSData");
        fs::create_dir_all(&gps).unwrap();
        fs::write(gps.join("t.csv"), "north,6.6,10:00:01\n").unwrap();
        assert!(matches!(
            read_gps_table(&gps),
            Err(AnalysisError::GpsDataError { .. })
        ));
        assert_eq!(read_gps_table(&dir.path().join("nowhere")).unwrap(), None);
    }
}
