//! GPS position from EXIF metadata
//!
//! Used by discovery when a folder has no GPS table. Latitude and longitude
//! are stored as degree/minute/second rationals with a separate hemisphere
//! reference tag.

use crate::error::{AnalysisError, Result};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub lat: f64,
    pub long: f64,
}

/// EXIF GPS extractor
pub struct ExifExtractor;

impl ExifExtractor {
    /// Read the GPS position embedded in an image file
    ///
    /// Returns `Ok(None)` when the file carries no EXIF block or no GPS tags.
    pub fn extract_gps(image_path: &Path) -> Result<Option<GpsPosition>> {
        let file = File::open(image_path)?;
        let mut reader = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(e) => {
                return Err(AnalysisError::exif(
                    format!("Failed to read EXIF from {}", image_path.display()),
                    e,
                ))
            }
        };

        let lat = Self::coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S');
        let long = Self::coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W');
        Ok(lat.zip(long).map(|(lat, long)| GpsPosition { lat, long }))
    }

    fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
        let dms = match exif.get_field(value_tag, In::PRIMARY)?.value {
            Value::Rational(ref parts) => parts
                .iter()
                .map(|r| Self::rational_to_float(r.num, r.denom))
                .collect::<Option<Vec<f64>>>()?,
            _ => return None,
        };
        let degrees = Self::dms_to_degrees(&dms)?;

        let negative = match exif.get_field(ref_tag, In::PRIMARY).map(|f| &f.value) {
            Some(Value::Ascii(strings)) => strings
                .first()
                .and_then(|s| s.first())
                .is_some_and(|c| c.to_ascii_uppercase() == negative_ref),
            _ => false,
        };
        Some(if negative { -degrees } else { degrees })
    }

    /// Degrees, minutes and seconds to decimal degrees
    fn dms_to_degrees(dms: &[f64]) -> Option<f64> {
        let (&d, rest) = dms.split_first()?;
        let m = rest.first().copied().unwrap_or(0.0);
        let s = rest.get(1).copied().unwrap_or(0.0);
        Some(d + m / 60.0 + s / 3600.0)
    }

    fn rational_to_float(numerator: u32, denominator: u32) -> Option<f64> {
        if denominator == 0 {
            None
        } else {
            Some(numerator as f64 / denominator as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rational_conversion() {
        assert_eq!(ExifExtractor::rational_to_float(1, 2), Some(0.5));
        assert_eq!(ExifExtractor::rational_to_float(100, 1), Some(100.0));
        assert_eq!(ExifExtractor::rational_to_float(1, 0), None);
    }

    #[test]
    fn test_dms_to_degrees() {
        assert_relative_eq!(
            ExifExtractor::dms_to_degrees(&[46.0, 31.0, 12.0]).unwrap(),
            46.52,
            epsilon = 1e-9
        );
        assert_eq!(ExifExtractor::dms_to_degrees(&[7.5]), Some(7.5));
        assert_eq!(ExifExtractor::dms_to_degrees(&[]), None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ExifExtractor::extract_gps(Path::new("/nonexistent/img_01.jpg")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }
}
