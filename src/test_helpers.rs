//! Fixtures shared by unit tests: synthetic JPEG/HEIC buffers, an EXIF
//! block builder, and scripted fetch/transcode doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::fetch::{Fetch, FetchError};
use crate::heic::{ConversionError, HeicTranscoder};
use crate::source::{PhotoSource, RawImageBuffer};

const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const TAG_MODIFY_DATE: u16 = 0x0132;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_GPS_IFD: u16 = 0x8825;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_CREATE_DATE: u16 = 0x9004;

const FORMAT_ASCII: u16 = 2;
const FORMAT_LONG: u16 = 4;
const FORMAT_RATIONAL: u16 = 5;

/// A small gray baseline JPEG with no metadata segments.
pub(crate) fn plain_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![128u8; (width * height * 3) as usize];
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 80)
        .encode(&pixels, width, height, ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Insert an APP1 segment right after SOI.
pub(crate) fn with_app1(jpeg: &[u8], payload: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let len = u16::try_from(payload.len() + 2).unwrap();

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// APP1 payload carrying an XMP packet.
pub(crate) fn xmp_app1(xml: &str) -> Vec<u8> {
    let mut out = XMP_HEADER.to_vec();
    out.extend_from_slice(xml.as_bytes());
    out
}

/// An XMP packet whose single `rdf:Description` carries `attrs` and
/// contains `elements`.
pub(crate) fn xmp_packet(attrs: &str, elements: &str) -> String {
    format!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description rdf:about="" xmlns:exif="http://ns.adobe.com/exif/1.0/" xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmlns:photoshop="http://ns.adobe.com/photoshop/1.0/" {attrs}>{elements}</rdf:Description></rdf:RDF></x:xmpmeta>"#
    )
}

/// A bare `ftyp` box with major brand `heic`. Sniffs as HEIC, decodes as nothing.
pub(crate) fn heic_header() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&24u32.to_be_bytes());
    out.extend_from_slice(b"ftyp");
    out.extend_from_slice(b"heic");
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(b"mif1heic");
    out
}

/// One little-endian IFD entry.
struct RawIfdEntry {
    tag_id: u16,
    data_format: u16,
    count: u32,
    data: Vec<u8>,
}

impl RawIfdEntry {
    fn ascii(tag_id: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self {
            tag_id,
            data_format: FORMAT_ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn long(tag_id: u16, value: u32) -> Self {
        Self {
            tag_id,
            data_format: FORMAT_LONG,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// Degrees as a single micro-degree rational; minutes and seconds zero.
    fn coordinate(tag_id: u16, value: f64) -> Self {
        let mut data = Vec::with_capacity(24);
        for (num, den) in [((value.abs() * 1e6).round() as u32, 1_000_000u32), (0, 1), (0, 1)] {
            data.extend_from_slice(&num.to_le_bytes());
            data.extend_from_slice(&den.to_le_bytes());
        }
        Self {
            tag_id,
            data_format: FORMAT_RATIONAL,
            count: 3,
            data,
        }
    }

    fn extra_len(&self) -> usize {
        if self.data.len() > 4 {
            (self.data.len() + 1) & !1
        } else {
            0
        }
    }
}

fn ifd_len(entries: &[RawIfdEntry]) -> usize {
    2 + entries.len() * 12 + 4 + entries.iter().map(RawIfdEntry::extra_len).sum::<usize>()
}

/// Append an IFD at `out.len()`, with its out-of-line values right after it.
fn write_ifd(out: &mut Vec<u8>, entries: &mut [RawIfdEntry]) {
    entries.sort_by_key(|e| e.tag_id);
    let start = out.len();
    let mut data_off = start + 2 + entries.len() * 12 + 4;
    let mut extra = Vec::new();

    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in entries.iter() {
        out.extend_from_slice(&entry.tag_id.to_le_bytes());
        out.extend_from_slice(&entry.data_format.to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        if entry.data.len() > 4 {
            out.extend_from_slice(&(data_off as u32).to_le_bytes());
            extra.extend_from_slice(&entry.data);
            if entry.data.len() % 2 != 0 {
                extra.push(0);
            }
            data_off += entry.extra_len();
        } else {
            let mut inline = [0u8; 4];
            inline[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&inline);
        }
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&extra);
}

/// Builds a little-endian TIFF/EXIF block with date and GPS tags.
#[derive(Default)]
pub(crate) struct ExifBuilder {
    date_time_original: Option<String>,
    create_date: Option<String>,
    modify_date: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    omit_gps_refs: bool,
}

impl ExifBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn date_time_original(mut self, value: &str) -> Self {
        self.date_time_original = Some(value.into());
        self
    }

    pub(crate) fn create_date(mut self, value: &str) -> Self {
        self.create_date = Some(value.into());
        self
    }

    pub(crate) fn modify_date(mut self, value: &str) -> Self {
        self.modify_date = Some(value.into());
        self
    }

    pub(crate) fn gps(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// A GPS block carrying latitude but no longitude.
    pub(crate) fn gps_latitude_only(mut self, latitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = None;
        self
    }

    /// Leave out `GPSLatitudeRef`/`GPSLongitudeRef`, as some writers do.
    pub(crate) fn without_gps_refs(mut self) -> Self {
        self.omit_gps_refs = true;
        self
    }

    /// The raw TIFF structure: header, IFD0, Exif IFD, GPS IFD.
    pub(crate) fn tiff(&self) -> Vec<u8> {
        let mut exif_entries = Vec::new();
        if let Some(v) = &self.date_time_original {
            exif_entries.push(RawIfdEntry::ascii(TAG_DATE_TIME_ORIGINAL, v));
        }
        if let Some(v) = &self.create_date {
            exif_entries.push(RawIfdEntry::ascii(TAG_CREATE_DATE, v));
        }

        let mut gps_entries = Vec::new();
        if let Some(lat) = self.latitude {
            if !self.omit_gps_refs {
                gps_entries.push(RawIfdEntry::ascii(0x0001, if lat < 0.0 { "S" } else { "N" }));
            }
            gps_entries.push(RawIfdEntry::coordinate(0x0002, lat));
        }
        if let Some(lon) = self.longitude {
            if !self.omit_gps_refs {
                gps_entries.push(RawIfdEntry::ascii(0x0003, if lon < 0.0 { "W" } else { "E" }));
            }
            gps_entries.push(RawIfdEntry::coordinate(0x0004, lon));
        }

        // Pointer values are patched in once sizes are known.
        let mut ifd0 = Vec::new();
        if let Some(v) = &self.modify_date {
            ifd0.push(RawIfdEntry::ascii(TAG_MODIFY_DATE, v));
        }
        if !exif_entries.is_empty() {
            ifd0.push(RawIfdEntry::long(TAG_EXIF_IFD, 0));
        }
        if !gps_entries.is_empty() {
            ifd0.push(RawIfdEntry::long(TAG_GPS_IFD, 0));
        }

        let exif_off = 8 + ifd_len(&ifd0);
        let gps_off = exif_off
            + if exif_entries.is_empty() {
                0
            } else {
                ifd_len(&exif_entries)
            };
        for entry in ifd0.iter_mut() {
            match entry.tag_id {
                TAG_EXIF_IFD => entry.data = (exif_off as u32).to_le_bytes().to_vec(),
                TAG_GPS_IFD => entry.data = (gps_off as u32).to_le_bytes().to_vec(),
                _ => {}
            }
        }

        let mut out = b"II".to_vec();
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        write_ifd(&mut out, &mut ifd0);
        if !exif_entries.is_empty() {
            write_ifd(&mut out, &mut exif_entries);
        }
        if !gps_entries.is_empty() {
            write_ifd(&mut out, &mut gps_entries);
        }
        out
    }

    /// The TIFF block wrapped as a JPEG APP1 payload.
    pub(crate) fn app1(&self) -> Vec<u8> {
        let mut out = b"Exif\0\0".to_vec();
        out.extend_from_slice(&self.tiff());
        out
    }
}

/// Transcoder returning a fixed result.
pub(crate) struct StaticTranscoder {
    output: Option<Vec<u8>>,
    work: Duration,
}

impl StaticTranscoder {
    pub(crate) fn ok(jpeg: Vec<u8>) -> Self {
        Self {
            output: Some(jpeg),
            work: Duration::ZERO,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            output: None,
            work: Duration::ZERO,
        }
    }

    /// Block the calling thread this long per conversion, like a real decoder.
    pub(crate) fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }
}

impl HeicTranscoder for StaticTranscoder {
    fn name(&self) -> &str {
        "static"
    }

    fn to_jpeg(&self, _heic: &[u8], _quality: u8) -> Result<Vec<u8>, ConversionError> {
        if !self.work.is_zero() {
            std::thread::sleep(self.work);
        }
        self.output
            .clone()
            .ok_or_else(|| ConversionError::Decode("scripted failure".into()))
    }
}

/// Fetcher answering from a table keyed by source identifier.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    responses: HashMap<String, Result<RawImageBuffer, FetchError>>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_bytes(mut self, id: &str, bytes: Vec<u8>) -> Self {
        self.responses
            .insert(id.into(), Ok(RawImageBuffer::new(bytes, None)));
        self
    }

    pub(crate) fn with_failure(mut self, id: &str, status: u16) -> Self {
        self.responses.insert(
            id.into(),
            Err(FetchError::NetworkFailure {
                resource: id.into(),
                status: Some(status),
                message: "scripted".into(),
            }),
        );
        self
    }

    pub(crate) fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.into(), delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, source: &PhotoSource) -> Result<RawImageBuffer, FetchError> {
        let id = source.identifier();
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }

        let mut result = self.responses.get(&id).cloned().unwrap_or_else(|| {
            Err(FetchError::ReadFailure {
                resource: id.clone(),
                message: "no scripted response".into(),
            })
        });
        // Hints travel with the source, as with the real fetcher.
        if let Ok(buffer) = &mut result {
            if buffer.content_type.is_none() {
                buffer.content_type = source.content_type().map(str::to_string);
            }
        }
        result
    }
}
