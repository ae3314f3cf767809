use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

use super::{ConversionError, HeicTranscoder, encode_rgb_jpeg};

/// HEIC decoding through the native libheif library.
#[derive(Debug, Default)]
pub struct LibheifTranscoder;

impl LibheifTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl HeicTranscoder for LibheifTranscoder {
    fn name(&self) -> &str {
        "libheif"
    }

    fn to_jpeg(&self, heic: &[u8], quality: u8) -> Result<Vec<u8>, ConversionError> {
        let decode_err = |e: libheif_rs::HeifError| ConversionError::Decode(e.to_string());

        let ctx = HeifContext::read_from_bytes(heic).map_err(decode_err)?;
        let handle = ctx.primary_image_handle().map_err(decode_err)?;
        // libheif refcounts its global init, so a handle per call is fine.
        let lib = LibHeif::new();
        let image = lib
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(decode_err)?;

        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConversionError::Decode("no interleaved RGB plane".into()))?;

        log::debug!(
            "Decoded HEIC primary image {}x{} (stride {})",
            plane.width,
            plane.height,
            plane.stride
        );
        encode_rgb_jpeg(plane.data, plane.width, plane.height, plane.stride, quality)
    }
}
