use serde::Serialize;

use crate::source::RawImageBuffer;

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// `ftyp` box type followed by a major brand, as found at offset 4 of an
/// ISO base media file.
const HEIF_SIGNATURES: &[&[u8; 8]] = &[
    b"ftypheic", b"ftypheix", b"ftypheim", b"ftypheis",
    b"ftyphevc", b"ftyphevx", b"ftypmif1", b"ftypmsf1",
];

/// The image format of a buffer, decided from its bytes.
///
/// # Example
///
/// ```rust
/// use tripshot::sniff::{ImageKind, sniff_bytes};
///
/// assert_eq!(sniff_bytes(&[0xFF, 0xD8, 0xFF, 0xE0], None), ImageKind::Jpeg);
/// assert_eq!(sniff_bytes(b"\0\0\0\x18ftypheic\0\0\0\0", None), ImageKind::Heic);
/// assert_eq!(sniff_bytes(b"GIF89a", Some("image/heif")), ImageKind::Heic);
/// assert_eq!(sniff_bytes(b"GIF89a", None), ImageKind::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    /// HEIC/HEIF container
    Heic,
    Unknown,
}

impl ImageKind {
    /// Interpret a content-type hint. Parameters (`; charset=...`) and case are ignored.
    pub fn from_content_type(hint: &str) -> Self {
        let mime = hint
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Self::Jpeg,
            "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence" => {
                Self::Heic
            }
            _ => Self::Unknown,
        }
    }

    /// MIME type for a buffer of this kind.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Heic => "image/heic",
            Self::Unknown => "application/octet-stream",
        }
    }
}

/// Determine the kind of a fetched buffer.
pub fn sniff(buffer: &RawImageBuffer) -> ImageKind {
    sniff_bytes(&buffer.bytes, buffer.content_type.as_deref())
}

/// Magic-number inspection with the hint as a last resort.
///
/// The hint is consulted only when the bytes match neither signature, so a
/// mislabeled upload is still classified by its content.
pub fn sniff_bytes(bytes: &[u8], hint: Option<&str>) -> ImageKind {
    if bytes.starts_with(&JPEG_SOI) {
        return ImageKind::Jpeg;
    }

    if let Some(signature) = bytes.get(4..12) {
        if HEIF_SIGNATURES.iter().any(|sig| signature == &sig[..]) {
            return ImageKind::Heic;
        }
    }

    hint.map(ImageKind::from_content_type)
        .unwrap_or(ImageKind::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heif_header(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 0x18];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"mif1heic");
        bytes
    }

    // ── JPEG ─────────────────────────────────────────────────────────

    #[test]
    fn jpeg_by_marker() {
        assert_eq!(sniff_bytes(&[0xFF, 0xD8], None), ImageKind::Jpeg);
        assert_eq!(sniff_bytes(&[0xFF, 0xD8, 0xFF, 0xE1, 0, 0], None), ImageKind::Jpeg);
    }

    #[test]
    fn jpeg_marker_beats_any_hint() {
        for hint in ["image/heic", "image/heif", "image/png", "text/plain"] {
            assert_eq!(
                sniff_bytes(&[0xFF, 0xD8, 0xFF, 0xDB], Some(hint)),
                ImageKind::Jpeg,
                "hint {hint} should not override JPEG bytes"
            );
        }
    }

    // ── HEIC ─────────────────────────────────────────────────────────

    #[test]
    fn heic_brands() {
        for brand in [b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1"] {
            assert_eq!(
                sniff_bytes(&heif_header(brand), None),
                ImageKind::Heic,
                "brand {}",
                String::from_utf8_lossy(brand)
            );
        }
    }

    #[test]
    fn heic_brand_beats_jpeg_hint() {
        assert_eq!(sniff_bytes(&heif_header(b"heic"), Some("image/jpeg")), ImageKind::Heic);
    }

    #[test]
    fn other_iso_brands_are_not_heic() {
        assert_eq!(sniff_bytes(&heif_header(b"avif"), None), ImageKind::Unknown);
        assert_eq!(sniff_bytes(&heif_header(b"isom"), None), ImageKind::Unknown);
    }

    // ── Hint fallback ────────────────────────────────────────────────

    #[test]
    fn hint_used_when_bytes_unrecognised() {
        assert_eq!(sniff_bytes(b"not an image", Some("image/heic")), ImageKind::Heic);
        assert_eq!(sniff_bytes(b"not an image", Some("IMAGE/JPEG; q=1")), ImageKind::Jpeg);
        assert_eq!(sniff_bytes(b"not an image", Some("image/png")), ImageKind::Unknown);
    }

    #[test]
    fn short_and_empty_buffers() {
        assert_eq!(sniff_bytes(&[], None), ImageKind::Unknown);
        assert_eq!(sniff_bytes(&[0xFF], None), ImageKind::Unknown);
        assert_eq!(sniff_bytes(b"\0\0\0\x18ftyphei", None), ImageKind::Unknown);
        assert_eq!(sniff_bytes(&[], Some("image/heif")), ImageKind::Heic);
    }

    #[test]
    fn sniff_reads_buffer_hint() {
        let buffer = RawImageBuffer::new(b"????".to_vec(), Some("image/heif".into()));
        assert_eq!(sniff(&buffer), ImageKind::Heic);
    }
}
