use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a photo's bytes come from.
///
/// Sources are caller-owned and immutable; the pipeline reads each one at most
/// once per extraction call.
///
/// # Example
///
/// ```rust
/// use tripshot::source::PhotoSource;
///
/// let remote = PhotoSource::url("https://example.com/jeju/beach.jpg");
/// let local = PhotoSource::file("photos/IMG_0001.HEIC").with_content_type("image/heic");
/// assert_eq!(remote.to_string(), "https://example.com/jeju/beach.jpg");
/// assert_eq!(local.content_type(), Some("image/heic"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Remote resource fetched over HTTP(S).
    Url(String),
    /// File on the local filesystem, read fully into memory.
    File {
        path: PathBuf,
        content_type: Option<String>,
    },
    /// Bytes the caller already holds (an uploaded file, a converted image).
    Bytes {
        name: String,
        data: Vec<u8>,
        content_type: Option<String>,
    },
}

impl PhotoSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            content_type: None,
        }
    }

    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            name: name.into(),
            data,
            content_type: None,
        }
    }

    /// Attach a content-type hint. URL sources never carry one, so this is a
    /// no-op for them.
    pub fn with_content_type(self, hint: impl Into<String>) -> Self {
        match self {
            Self::Url(url) => Self::Url(url),
            Self::File { path, .. } => Self::File {
                path,
                content_type: Some(hint.into()),
            },
            Self::Bytes { name, data, .. } => Self::Bytes {
                name,
                data,
                content_type: Some(hint.into()),
            },
        }
    }

    /// The caller-supplied content-type hint, if any.
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Url(_) => None,
            Self::File { content_type, .. } | Self::Bytes { content_type, .. } => {
                content_type.as_deref()
            }
        }
    }

    /// A short human-readable identifier used in logs and errors.
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    /// Parse a CLI-style argument: anything with an http(s) scheme is a URL,
    /// everything else is a local path.
    pub fn parse(arg: &str) -> Self {
        let lower = arg.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Url(arg.to_string())
        } else {
            Self::file(arg)
        }
    }
}

impl fmt::Display for PhotoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File { path, .. } => write!(f, "{}", path.display()),
            Self::Bytes { name, .. } => f.write_str(name),
        }
    }
}

/// Raw bytes of one fetched image plus the hint that came with its source.
///
/// Owned by the pipeline invocation that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageBuffer {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl RawImageBuffer {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A trip group as served by the gallery backend.
///
/// Only `gallery_images` feeds the pipeline; the rest is carried for the
/// presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub places: Vec<String>,
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub gallery_images: Vec<String>,
}

impl Group {
    /// Gallery image identifiers as photo sources, in gallery order.
    pub fn photo_sources(&self) -> Vec<PhotoSource> {
        self.gallery_images
            .iter()
            .map(|src| PhotoSource::parse(src))
            .collect()
    }

    /// Parse either a single group object or an array of groups.
    pub fn parse_many(json: &str) -> serde_json::Result<Vec<Group>> {
        match serde_json::from_str::<Vec<Group>>(json) {
            Ok(groups) => Ok(groups),
            Err(_) => serde_json::from_str::<Group>(json).map(|g| vec![g]),
        }
    }
}
