use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, GPSInfo, LatLng, MediaParser, MediaSource};
use std::io::Cursor;

use super::{GpsCoords, ParseError, TagSet, parse_datetime};

/// Read the EXIF date tags and GPS block from a JPEG or HEIC buffer.
pub(crate) fn read_exif(bytes: &[u8]) -> Result<TagSet, ParseError> {
    let container_err = |e: nom_exif::Error| ParseError::Container(e.to_string());

    let mut parser = MediaParser::new();
    let ms = MediaSource::seekable(Cursor::new(bytes.to_vec())).map_err(container_err)?;
    if !ms.has_exif() {
        return Ok(TagSet::default());
    }

    let iter: ExifIter = parser.parse(ms).map_err(container_err)?;

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps = match iter.parse_gps_info() {
        Ok(info) => info.and_then(|info| gps_to_coords(&info)),
        Err(e) => {
            log::debug!("Ignoring unreadable GPS block: {e}");
            None
        }
    };
    let exif: Exif = iter.into();

    let tags = TagSet {
        original: date_tag(&exif, ExifTag::DateTimeOriginal),
        created: date_tag(&exif, ExifTag::CreateDate),
        modified: date_tag(&exif, ExifTag::ModifyDate),
        gps,
    };
    log::debug!("EXIF tags: {tags:?}");
    Ok(tags)
}

/// Date values render as text whether nom-exif parsed them or not, so the
/// text form goes through the same parser as XMP dates.
fn date_tag(exif: &Exif, tag: ExifTag) -> Option<chrono::NaiveDateTime> {
    entry_to_string(exif.get(tag)?).and_then(|s| parse_datetime(&s))
}

/// Convert an EntryValue to an Option<String>.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// A block missing either axis yields no coordinates. A missing hemisphere
/// reference reads as north/east; an unrecognised one rejects the block.
fn gps_to_coords(gps: &GPSInfo) -> Option<GpsCoords> {
    let lat_sign = hemisphere_sign(gps.latitude_ref, 'N', 'S')?;
    let lon_sign = hemisphere_sign(gps.longitude_ref, 'E', 'W')?;

    GpsCoords::new(
        lat_sign * latlng_to_decimal(&gps.latitude)?,
        lon_sign * latlng_to_decimal(&gps.longitude)?,
    )
}

/// nom-exif leaves an absent reference as `'\0'`.
fn hemisphere_sign(reference: char, positive: char, negative: char) -> Option<f64> {
    match reference.to_ascii_uppercase() {
        '\0' => Some(1.0),
        c if c == positive => Some(1.0),
        c if c == negative => Some(-1.0),
        _ => None,
    }
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to unsigned decimal degrees.
fn latlng_to_decimal(latlng: &LatLng) -> Option<f64> {
    let part = |num: u32, den: u32| (den != 0).then(|| num as f64 / den as f64);

    let degrees = part(latlng.0.0, latlng.0.1)?;
    // Some writers leave minutes/seconds as 0/0 when degrees carry the full value.
    let minutes = part(latlng.1.0, latlng.1.1).unwrap_or(0.0);
    let seconds = part(latlng.2.0, latlng.2.1).unwrap_or(0.0);

    Some(degrees + minutes / 60.0 + seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latlng(d: (u32, u32), m: (u32, u32), s: (u32, u32)) -> LatLng {
        [d, m, s].into()
    }

    #[test]
    fn dms_to_decimal() {
        let v = latlng_to_decimal(&latlng((33, 1), (27, 1), (25236, 10000))).unwrap();
        assert!((v - 33.450701).abs() < 1e-6);
    }

    #[test]
    fn zero_denominator_degrees_is_invalid() {
        assert_eq!(latlng_to_decimal(&latlng((33, 0), (0, 1), (0, 1))), None);
    }

    #[test]
    fn zero_denominator_minutes_ignored() {
        let v = latlng_to_decimal(&latlng((33450701, 1000000), (0, 0), (0, 0))).unwrap();
        assert!((v - 33.450701).abs() < 1e-9);
    }

    #[test]
    fn hemisphere_references() {
        assert_eq!(hemisphere_sign('N', 'N', 'S'), Some(1.0));
        assert_eq!(hemisphere_sign('s', 'N', 'S'), Some(-1.0));
        assert_eq!(hemisphere_sign('W', 'E', 'W'), Some(-1.0));
        assert_eq!(hemisphere_sign('\0', 'E', 'W'), Some(1.0));
        assert_eq!(hemisphere_sign('X', 'N', 'S'), None);
    }

    #[test]
    fn non_image_bytes_yield_nothing() {
        match read_exif(b"definitely not media") {
            Ok(tags) => assert_eq!(tags, TagSet::default()),
            Err(e) => assert!(matches!(e, ParseError::Container(_))),
        }
    }
}
