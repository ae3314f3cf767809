//! HEIC/HEIF → JPEG normalization.
//!
//! Browsers and most image widgets cannot render HEIC, so HEIC photos are
//! transcoded to JPEG for display. Decoding goes through a
//! [`HeicTranscoder`]; the bundled libheif-backed one is compiled with the
//! `heic` feature. Without it, [`default_transcoder`] returns a transcoder
//! that always reports [`ConversionError::Unavailable`], and callers fall
//! back to the original bytes.

#[cfg(feature = "heic")]
mod libheif;

#[cfg(feature = "heic")]
pub use libheif::LibheifTranscoder;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

use crate::sniff::{ImageKind, sniff_bytes};
use crate::source::RawImageBuffer;

/// Default JPEG quality for converted HEIC photos (0.9 on a 0–1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Why a HEIC buffer could not be turned into a JPEG.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("HEIC decode failed: {0}")]
    Decode(String),
    #[error("JPEG encode failed: {0}")]
    Encode(String),
    #[error("no HEIC decoder available in this build")]
    Unavailable,
}

/// A HEIC decoder that produces JPEG bytes.
pub trait HeicTranscoder: Send + Sync {
    /// The display name of this transcoder (e.g. "libheif").
    fn name(&self) -> &str;
    /// Decode the primary image of `heic` and re-encode it as JPEG at `quality` (1–100).
    fn to_jpeg(&self, heic: &[u8], quality: u8) -> Result<Vec<u8>, ConversionError>;
}

/// Transcoder used when the crate is built without a HEIC decoder.
pub struct UnavailableTranscoder;

impl HeicTranscoder for UnavailableTranscoder {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn to_jpeg(&self, _heic: &[u8], _quality: u8) -> Result<Vec<u8>, ConversionError> {
        Err(ConversionError::Unavailable)
    }
}

/// The best transcoder this build offers.
pub fn default_transcoder() -> Box<dyn HeicTranscoder> {
    #[cfg(feature = "heic")]
    {
        Box::new(LibheifTranscoder::new())
    }
    #[cfg(not(feature = "heic"))]
    {
        Box::new(UnavailableTranscoder)
    }
}

/// Convert a HEIC buffer into a JPEG buffer. Attempted once, never retried.
///
/// The transcoder's output is checked to actually be JPEG so the result is
/// always directly renderable.
pub fn normalize(
    transcoder: &dyn HeicTranscoder,
    buffer: &RawImageBuffer,
    quality: u8,
) -> Result<RawImageBuffer, ConversionError> {
    if buffer.is_empty() {
        return Err(ConversionError::Decode("empty buffer".into()));
    }

    let jpeg = transcoder.to_jpeg(&buffer.bytes, quality.clamp(1, 100))?;
    if sniff_bytes(&jpeg, None) != ImageKind::Jpeg {
        return Err(ConversionError::Encode(format!(
            "{} produced non-JPEG output",
            transcoder.name()
        )));
    }

    Ok(RawImageBuffer::new(
        jpeg,
        Some(ImageKind::Jpeg.mime_type().to_string()),
    ))
}

/// Encode an interleaved 8-bit RGB plane as JPEG.
///
/// `stride` is the byte length of one row in `data` and may exceed
/// `width * 3` (decoders pad rows for alignment).
pub fn encode_rgb_jpeg(
    data: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    if width == 0 || height == 0 {
        return Err(ConversionError::Encode(format!(
            "invalid dimensions {width}x{height}"
        )));
    }

    let row_len = width as usize * 3;
    if stride < row_len {
        return Err(ConversionError::Encode(format!(
            "stride {stride} shorter than row length {row_len}"
        )));
    }
    let needed = stride * (height as usize - 1) + row_len;
    if data.len() < needed {
        return Err(ConversionError::Encode(format!(
            "plane has {} bytes, need {needed}",
            data.len()
        )));
    }

    let packed: Vec<u8> = if stride == row_len {
        data[..row_len * height as usize].to_vec()
    } else {
        data.chunks(stride)
            .take(height as usize)
            .flat_map(|row| &row[..row_len])
            .copied()
            .collect()
    };

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(&packed, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| ConversionError::Encode(e.to_string()))?;
    Ok(out)
}
