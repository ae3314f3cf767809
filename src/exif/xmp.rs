use img_parts::jpeg::Jpeg;
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{LocalName, Namespace, ResolveResult};

use super::{GpsCoords, ParseError, TagSet, parse_datetime};

/// APP1 payload prefix of a JPEG XMP segment.
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const PACKET_START: &[u8] = b"<x:xmpmeta";
const PACKET_END: &[u8] = b"</x:xmpmeta>";

/// XMP schemas that carry dates or GPS.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Schema {
    Exif,
    Basic,
    Photoshop,
}

impl Schema {
    fn from_uri(uri: &[u8]) -> Option<Self> {
        match uri {
            b"http://ns.adobe.com/exif/1.0/" => Some(Self::Exif),
            b"http://ns.adobe.com/xap/1.0/" => Some(Self::Basic),
            b"http://ns.adobe.com/photoshop/1.0/" => Some(Self::Photoshop),
            _ => None,
        }
    }

    /// Conventional prefixes, for packets that use them without declaring them.
    fn from_prefix(prefix: &[u8]) -> Option<Self> {
        match prefix {
            b"exif" => Some(Self::Exif),
            b"xmp" | b"xap" => Some(Self::Basic),
            b"photoshop" => Some(Self::Photoshop),
            _ => None,
        }
    }

    fn resolve(ns: ResolveResult<'_>) -> Option<Self> {
        match ns {
            ResolveResult::Bound(Namespace(uri)) => Self::from_uri(uri),
            ResolveResult::Unknown(prefix) => Self::from_prefix(&prefix),
            ResolveResult::Unbound => None,
        }
    }
}

/// Which date slot or coordinate an XMP property fills.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Property {
    Original,
    Created,
    Modified,
    Latitude,
    Longitude,
}

impl Property {
    fn from_name(schema: Schema, local: &[u8]) -> Option<Self> {
        match (schema, local) {
            (Schema::Exif, b"DateTimeOriginal") | (Schema::Photoshop, b"DateCreated") => {
                Some(Self::Original)
            }
            (Schema::Basic, b"CreateDate") => Some(Self::Created),
            (Schema::Basic, b"ModifyDate") => Some(Self::Modified),
            (Schema::Exif, b"GPSLatitude") => Some(Self::Latitude),
            (Schema::Exif, b"GPSLongitude") => Some(Self::Longitude),
            _ => None,
        }
    }

    fn resolve((ns, local): (ResolveResult<'_>, LocalName<'_>)) -> Option<Self> {
        Self::from_name(Schema::resolve(ns)?, local.as_ref())
    }
}

#[derive(Default)]
struct Collected {
    original: Option<String>,
    created: Option<String>,
    modified: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
}

impl Collected {
    /// First occurrence wins.
    fn set(&mut self, prop: Property, value: String) {
        let slot = match prop {
            Property::Original => &mut self.original,
            Property::Created => &mut self.created,
            Property::Modified => &mut self.modified,
            Property::Latitude => &mut self.latitude,
            Property::Longitude => &mut self.longitude,
        };
        if slot.is_none() && !value.trim().is_empty() {
            *slot = Some(value);
        }
    }
}

/// The XMP packet of a JPEG, from its APP1 XMP segment.
pub(super) fn jpeg_packet(jpeg: &Jpeg) -> Option<String> {
    let segment = jpeg
        .segments()
        .iter()
        .find(|s| s.marker() == 0xE1 && s.contents().starts_with(XMP_HEADER))?;
    let contents = segment.contents();
    let body = &contents[XMP_HEADER.len()..];
    slice_packet(body).or_else(|| Some(String::from_utf8_lossy(body).into_owned()))
}

/// Find an XMP packet anywhere in a container (HEIC stores it as an
/// uncompressed `mime` item).
pub(super) fn scan_packet(bytes: &[u8]) -> Option<String> {
    slice_packet(bytes)
}

fn slice_packet(bytes: &[u8]) -> Option<String> {
    let start = find(bytes, PACKET_START)?;
    let end = find(&bytes[start..], PACKET_END)? + start + PACKET_END.len();
    Some(String::from_utf8_lossy(&bytes[start..end]).into_owned())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read the date and GPS properties of an XMP packet.
///
/// Properties may appear as attributes of `rdf:Description` or as child
/// elements; both forms are accepted. Prefixes are resolved through their
/// namespace declarations. A GPS value in an unrecognised layout reads as
/// no location.
pub(super) fn parse_packet(xml: &str) -> Result<TagSet, ParseError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut collected = Collected::default();
    let mut current: Option<Property> = None;

    loop {
        match reader.read_event().map_err(|e| ParseError::Xmp(e.to_string()))? {
            Event::Start(e) => {
                collect_attributes(&reader, &e, &mut collected)?;
                current = Property::resolve(reader.resolve_element(e.name()));
            }
            Event::Empty(e) => collect_attributes(&reader, &e, &mut collected)?,
            Event::Text(t) => {
                if let Some(prop) = current {
                    let text = t.unescape().map_err(|e| ParseError::Xmp(e.to_string()))?;
                    collected.set(prop, text.into_owned());
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }

    let tags = TagSet {
        original: collected.original.as_deref().and_then(parse_datetime),
        created: collected.created.as_deref().and_then(parse_datetime),
        modified: collected.modified.as_deref().and_then(parse_datetime),
        gps: match (&collected.latitude, &collected.longitude) {
            (Some(lat), Some(lon)) => {
                match (parse_coordinate(lat, 'N', 'S'), parse_coordinate(lon, 'E', 'W')) {
                    (Some(lat), Some(lon)) => GpsCoords::new(lat, lon),
                    _ => {
                        log::debug!("Ignoring unreadable XMP GPS value {lat:?}, {lon:?}");
                        None
                    }
                }
            }
            _ => None,
        },
    };
    log::debug!("XMP tags: {tags:?}");
    Ok(tags)
}

fn collect_attributes(
    reader: &NsReader<&[u8]>,
    e: &BytesStart<'_>,
    collected: &mut Collected,
) -> Result<(), ParseError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ParseError::Xmp(e.to_string()))?;
        if let Some(prop) = Property::resolve(reader.resolve_attribute(attr.key)) {
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::Xmp(e.to_string()))?;
            collected.set(prop, value.into_owned());
        }
    }
    Ok(())
}

/// Parse an XMP GPS coordinate: `DDD,MM,SSk`, `DDD,MM.mmk`, or plain signed
/// decimal degrees. `k` is the hemisphere letter.
fn parse_coordinate(raw: &str, positive: char, negative: char) -> Option<f64> {
    let s = raw.trim();

    let (body, sign) = match s.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some(c) if c == positive => (&s[..s.len() - 1], 1.0),
        Some(c) if c == negative => (&s[..s.len() - 1], -1.0),
        _ => (s, 1.0),
    };

    let parts: Vec<f64> = body
        .split(',')
        .map(|p| p.trim().parse::<f64>().ok())
        .collect::<Option<_>>()?;

    let value = match parts.as_slice() {
        [deg] => *deg,
        [deg, min] => deg + min / 60.0,
        [deg, min, sec] => deg + min / 60.0 + sec / 3600.0,
        _ => return None,
    };
    Some(sign * value)
}
