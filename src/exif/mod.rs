//! EXIF metadata extraction module
//!
//! Reads the GPS position stored in image metadata, the fallback
//! geolocation source for folders without a GPS table.

pub mod extractor;

pub use extractor::{ExifExtractor, GpsPosition};
