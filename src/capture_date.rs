//! Capture date resolution.
//!
//! A file's capture date comes from its embedded EXIF `DateTimeOriginal`
//! field when one is present and parseable, otherwise from a camera-style
//! filename such as `IMG_20230401_153000.jpg`. Metadata always wins over the
//! filename. Failures on either path are logged and resolve to "no date";
//! nothing here returns an error to the caller.
//!
//! The same EXIF reader also exposes the device model and GPS position, which
//! the CSV export uses.

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Reader, Tag, Value};
use log::{debug, warn};
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::LazyLock;

/// A resolved capture timestamp. Only ever derived from a source file.
pub type CaptureDate = NaiveDateTime;

/// Timestamp layout used by EXIF date fields.
pub const METADATA_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

static FILENAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(IMG|VID)_(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})")
        .expect("filename date pattern is a valid regex")
});

/// Errors raised while reading embedded metadata. Never surfaced past this module.
#[derive(Debug, thiserror::Error)]
enum MetadataError {
    #[error("cannot open file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read EXIF: {0}")]
    Exif(#[from] exif::Error),
}

/// Resolves the capture date of `path`, trying metadata first and the filename second.
///
/// # Examples
///
/// ```no_run
/// use snapsort::capture_date::resolve_capture_date;
/// use std::path::Path;
///
/// if let Some(date) = resolve_capture_date(Path::new("/photos/IMG_20230401_153000.jpg")) {
///     println!("taken {}", date);
/// }
/// ```
pub fn resolve_capture_date(path: &Path) -> Option<CaptureDate> {
    if let Some(date) = date_from_metadata(path) {
        return Some(date);
    }
    let file_name = path.file_name()?.to_string_lossy();
    date_from_filename(&file_name)
}

/// Reads `DateTimeOriginal` from the file's EXIF block.
pub fn date_from_metadata(path: &Path) -> Option<CaptureDate> {
    let exif = read_exif_logged(path)?;
    capture_date_of(&exif, path)
}

/// Parses a `(IMG|VID)_YYYYMMDD_HHMMSS` token anywhere in `file_name`.
///
/// Returns `None` if there is no match or the digits do not form a valid
/// calendar timestamp (e.g. month 13).
pub fn date_from_filename(file_name: &str) -> Option<CaptureDate> {
    let caps = FILENAME_DATE.captures(file_name)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(2)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(3)?, field(4)?)
        .and_then(|d| d.and_hms_opt(field(5)?, field(6)?, field(7)?));

    if date.is_none() {
        warn!("Filename {} carries an invalid date", file_name);
    }
    date
}

/// Device model and GPS position for one file, as shown in the CSV export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub gps: Option<GpsPosition>,
}

/// A position in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl std::fmt::Display for GpsPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Reads the device model and GPS fields. Missing metadata yields an empty `DeviceInfo`.
pub fn device_info(path: &Path) -> DeviceInfo {
    let Some(exif) = read_exif_logged(path) else {
        return DeviceInfo::default();
    };
    DeviceInfo {
        model: ascii_field(&exif, Tag::Model),
        gps: gps_position(&exif),
    }
}

fn read_exif(path: &Path) -> Result<Exif, MetadataError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Ok(Reader::new().read_from_container(&mut reader)?)
}

fn read_exif_logged(path: &Path) -> Option<Exif> {
    match read_exif(path) {
        Ok(exif) => Some(exif),
        Err(MetadataError::Exif(exif::Error::NotFound(_) | exif::Error::InvalidFormat(_))) => {
            debug!("No EXIF data in {}", path.display());
            None
        }
        Err(e) => {
            warn!("EXIF error for {}: {}", path.display(), e);
            None
        }
    }
}

fn capture_date_of(exif: &Exif, path: &Path) -> Option<CaptureDate> {
    let raw = ascii_field(exif, Tag::DateTimeOriginal)?;
    match NaiveDateTime::parse_from_str(&raw, METADATA_TIMESTAMP_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!(
                "Unparseable DateTimeOriginal '{}' in {}: {}",
                raw,
                path.display(),
                e
            );
            None
        }
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => {
            let text = String::from_utf8_lossy(parts.first()?)
                .trim_end_matches('\0')
                .trim()
                .to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn gps_position(exif: &Exif) -> Option<GpsPosition> {
    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?;
    Some(GpsPosition {
        latitude,
        longitude,
    })
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative: char) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(ref parts) = field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }
    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    let reference = ascii_field(exif, ref_tag)?;
    if reference.starts_with(negative) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}
