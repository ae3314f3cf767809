//! Capture date and GPS extraction from embedded image metadata.
//!
//! Two entry points:
//!
//! - [`extract`]: never fails; a buffer whose metadata cannot be parsed
//!   yields the same all-absent [`PhotoMetadata`] as one with no metadata.
//! - [`try_extract`]: same resolution rules, but reports parse failures as
//!   [`ParseError`] for callers that need to tell the two apart.
//!
//! EXIF (baseline IFD0, Exif sub-IFD, GPS sub-IFD) is read with nom-exif; the
//! XMP packet is located with img-parts (JPEG) or a byte scan (HEIC) and read
//! with quick-xml.
//!
//! Capture date resolution is a strict chain: original capture
//! (`DateTimeOriginal`), then creation (`CreateDate`), then last-modified
//! (`ModifyDate`). At each step an EXIF value wins over an XMP value.

mod reader;
mod xmp;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sniff::{ImageKind, sniff_bytes};

/// A latitude/longitude pair in signed decimal degrees (south and west negative).
///
/// Latitude and longitude only ever travel together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoords {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoords {
    /// Build a pair, rejecting non-finite or out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && latitude.abs() <= 90.0
            && longitude.abs() <= 180.0;
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Capture date and location of one photo. Every field is independently
/// optional.
///
/// # Example
///
/// ```rust
/// use tripshot::exif::PhotoMetadata;
///
/// let meta = PhotoMetadata::from_parts(None, Some(33.45), None);
/// // A lone latitude is not a location.
/// assert_eq!(meta.latitude(), None);
/// assert_eq!(meta.longitude(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    /// Wall-clock capture time as recorded by the camera.
    pub capture_date: Option<NaiveDateTime>,
    pub location: Option<GpsCoords>,
}

impl PhotoMetadata {
    /// Assemble from loose fields. A coordinate without its partner is dropped.
    pub fn from_parts(
        capture_date: Option<NaiveDateTime>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        let location = match (latitude, longitude) {
            (Some(lat), Some(lon)) => GpsCoords::new(lat, lon),
            _ => None,
        };
        Self {
            capture_date,
            location,
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.location.map(|l| l.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.location.map(|l| l.longitude)
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.capture_date.is_none() && self.location.is_none()
    }
}

/// Embedded metadata was present but could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed image container or EXIF block: {0}")]
    Container(String),
    #[error("malformed XMP packet: {0}")]
    Xmp(String),
}

/// Date and GPS candidates read from one tag group.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct TagSet {
    pub original: Option<NaiveDateTime>,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub gps: Option<GpsCoords>,
}

/// Extract metadata, treating any parse failure as "no metadata".
///
/// An unreadable XMP packet only drops the XMP values; EXIF values from a
/// readable container are kept.
pub fn extract(bytes: &[u8]) -> PhotoMetadata {
    match read_metadata(bytes) {
        Ok((meta, None)) => meta,
        Ok((meta, Some(e))) => {
            log::debug!("XMP unreadable, using EXIF only: {e}");
            meta
        }
        Err(e) => {
            log::debug!("Metadata unreadable, treating as absent: {e}");
            PhotoMetadata::default()
        }
    }
}

/// Extract metadata, reporting malformed tag structures.
///
/// Works on JPEG and on HEIC containers directly. Buffers of unknown kind
/// are only searched for an XMP packet. A malformed XMP packet is reported
/// as [`ParseError::Xmp`] even when [`extract`] would still return EXIF
/// values for the same buffer.
pub fn try_extract(bytes: &[u8]) -> Result<PhotoMetadata, ParseError> {
    match read_metadata(bytes)? {
        (meta, None) => Ok(meta),
        (_, Some(e)) => Err(e),
    }
}

/// Resolved metadata plus the XMP error, if the packet could not be read.
/// Only a broken container fails outright.
fn read_metadata(bytes: &[u8]) -> Result<(PhotoMetadata, Option<ParseError>), ParseError> {
    let (exif, packet) = match sniff_bytes(bytes, None) {
        ImageKind::Jpeg => read_jpeg(bytes)?,
        ImageKind::Heic => (reader::read_exif(bytes)?, xmp::scan_packet(bytes)),
        ImageKind::Unknown => (TagSet::default(), xmp::scan_packet(bytes)),
    };

    let (xmp, xmp_error) = match packet.map(|p| xmp::parse_packet(&p)) {
        Some(Ok(tags)) => (tags, None),
        Some(Err(e)) => (TagSet::default(), Some(e)),
        None => (TagSet::default(), None),
    };

    Ok((resolve(&exif, &xmp), xmp_error))
}

/// JPEG segments tell us whether EXIF is there at all; a JPEG without an
/// EXIF APP1 segment is simply undated, not malformed.
fn read_jpeg(bytes: &[u8]) -> Result<(TagSet, Option<String>), ParseError> {
    match Jpeg::from_bytes(Bytes::copy_from_slice(bytes)) {
        Ok(jpeg) => {
            let exif = if jpeg.exif().is_some() {
                reader::read_exif(bytes)?
            } else {
                TagSet::default()
            };
            Ok((exif, xmp::jpeg_packet(&jpeg)))
        }
        Err(e) => {
            // Truncated or oddly padded files still often carry a readable APP1.
            log::debug!("JPEG segment parse failed ({e}), reading EXIF directly");
            Ok((reader::read_exif(bytes)?, xmp::scan_packet(bytes)))
        }
    }
}

fn resolve(exif: &TagSet, xmp: &TagSet) -> PhotoMetadata {
    let capture_date = exif
        .original
        .or(xmp.original)
        .or(exif.created)
        .or(xmp.created)
        .or(exif.modified)
        .or(xmp.modified);

    PhotoMetadata {
        capture_date,
        location: exif.gps.or(xmp.gps),
    }
}

/// Date-time layouts seen in EXIF and XMP values, without offsets.
const NAIVE_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Layouts carrying a UTC offset; the local wall-clock part is kept.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S %:z",
    "%Y:%m:%d %H:%M:%S%:z",
];

const DATE_FORMATS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d"];

/// Parse an EXIF or XMP timestamp into a naive wall-clock value.
///
/// Placeholder values such as `0000:00:00 00:00:00` or blanks yield `None`.
pub(crate) fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim().trim_matches(|c: char| c == '"' || c == '\0').trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(naive, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}
