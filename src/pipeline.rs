use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::config::Config;
use crate::exif::{self, PhotoMetadata};
use crate::fetch::{Fetch, FetchError, ResourceFetcher};
use crate::heic::{self, DEFAULT_JPEG_QUALITY, HeicTranscoder};
use crate::sniff::{ImageKind, sniff, sniff_bytes};
use crate::source::{PhotoSource, RawImageBuffer};

/// File extensions picked up when walking directories.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "heic", "heif"];

/// One resolved gallery entry, ready for display.
///
/// `display_source` is always something a renderer can show directly: the
/// original for JPEG (and anything that is not HEIC), a converted JPEG held
/// in memory for HEIC, or the original again when conversion failed.
///
/// # Example
///
/// ```rust,no_run
/// use tripshot::pipeline::Pipeline;
/// use tripshot::source::PhotoSource;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pipeline = Pipeline::from_config(&Default::default())?;
/// let photo = pipeline
///     .build_gallery_photo(&PhotoSource::file("IMG_0042.HEIC"))
///     .await?;
///
/// if photo.is_converted() {
///     println!("<img src=\"{}\">", photo.display_data_uri());
/// }
/// println!("taken: {:?}", photo.metadata.capture_date);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryPhoto {
    pub original_source: PhotoSource,
    pub display_source: PhotoSource,
    /// Format of the original bytes.
    pub kind: ImageKind,
    pub metadata: PhotoMetadata,
}

impl GalleryPhoto {
    /// True when the display source is a converted image rather than the original.
    pub fn is_converted(&self) -> bool {
        self.display_source != self.original_source
    }

    /// The display source as something an `<img>` tag accepts: a base64
    /// `data:` URI for in-memory bytes, the locator otherwise.
    pub fn display_data_uri(&self) -> String {
        match &self.display_source {
            PhotoSource::Bytes {
                data, content_type, ..
            } => {
                let mime = content_type
                    .as_deref()
                    .unwrap_or_else(|| sniff_bytes(data, None).mime_type());
                format!("data:{mime};base64,{}", BASE64.encode(data))
            }
            other => other.to_string(),
        }
    }
}

/// Fetch → sniff → (convert) → extract, for single photos and whole galleries.
///
/// Cheap to clone; clones share the fetcher and transcoder.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn Fetch>,
    transcoder: Arc<dyn HeicTranscoder>,
    quality: u8,
    max_concurrency: usize,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetch>, transcoder: Arc<dyn HeicTranscoder>) -> Self {
        Self {
            fetcher,
            transcoder,
            quality: DEFAULT_JPEG_QUALITY,
            max_concurrency: 0,
        }
    }

    /// Build a pipeline with the HTTP fetcher and the best transcoder this
    /// build offers, tuned by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher =
            ResourceFetcher::from_config(&config.fetch).context("Failed to build HTTP client")?;
        let transcoder: Arc<dyn HeicTranscoder> = Arc::from(heic::default_transcoder());
        log::debug!("Using HEIC transcoder: {}", transcoder.name());

        Ok(Self::new(Arc::new(fetcher), transcoder)
            .with_quality(config.conversion.quality())
            .with_max_concurrency(config.batch.max_concurrency))
    }

    /// JPEG quality (1–100) for converted HEIC photos.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Upper bound on photos processed at once by [`build_gallery`](Self::build_gallery).
    /// `0` means unbounded.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Capture date and location of one photo.
    ///
    /// Never fails: a source that cannot be fetched reads the same as one
    /// with no metadata.
    pub async fn extract_metadata(&self, source: &PhotoSource) -> PhotoMetadata {
        let buffer = match self.fetcher.fetch(source).await {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("{e}");
                return PhotoMetadata::default();
            }
        };

        tokio::task::spawn_blocking(move || exif::extract(&buffer.bytes))
            .await
            .unwrap_or_else(|e| {
                log::warn!("Metadata extraction for {source} did not complete: {e}");
                PhotoMetadata::default()
            })
    }

    /// Run the full pipeline for one photo.
    ///
    /// Only a fetch failure is an error. HEIC conversion failures fall back
    /// to the original as display source; unreadable metadata comes back as
    /// all-absent.
    pub async fn build_gallery_photo(
        &self,
        source: &PhotoSource,
    ) -> Result<GalleryPhoto, FetchError> {
        let buffer = self.fetcher.fetch(source).await?;
        let kind = sniff(&buffer);

        // Decoding, encoding and tag parsing block; keep them off the runtime workers.
        let pipeline = self.clone();
        let owned = source.clone();
        let assembled =
            tokio::task::spawn_blocking(move || pipeline.assemble(&owned, kind, &buffer)).await;

        Ok(assembled.unwrap_or_else(|e| {
            log::warn!("Processing {source} did not complete, showing original: {e}");
            GalleryPhoto {
                original_source: source.clone(),
                display_source: source.clone(),
                kind,
                metadata: PhotoMetadata::default(),
            }
        }))
    }

    fn assemble(
        &self,
        source: &PhotoSource,
        kind: ImageKind,
        buffer: &RawImageBuffer,
    ) -> GalleryPhoto {
        // Tags usually survive in the HEIC container, so extraction always
        // reads the original bytes.
        let metadata = exif::extract(&buffer.bytes);

        let display_source = match kind {
            ImageKind::Heic => {
                match heic::normalize(self.transcoder.as_ref(), buffer, self.quality) {
                    Ok(jpeg) => PhotoSource::Bytes {
                        name: converted_name(source),
                        data: jpeg.bytes,
                        content_type: jpeg.content_type,
                    },
                    Err(e) => {
                        log::warn!("HEIC conversion failed for {source}, showing original: {e}");
                        source.clone()
                    }
                }
            }
            ImageKind::Jpeg | ImageKind::Unknown => source.clone(),
        };

        log::debug!(
            "{source}: {kind:?}, date {:?}, location {:?}",
            metadata.capture_date,
            metadata.location
        );
        GalleryPhoto {
            original_source: source.clone(),
            display_source,
            kind,
            metadata,
        }
    }

    /// Build and order a whole gallery.
    ///
    /// Every photo runs in its own task; all of them finish before ordering.
    /// Photos that cannot be fetched are left out. Dropping the returned
    /// future aborts the outstanding tasks.
    pub async fn build_gallery(&self, sources: &[PhotoSource]) -> Vec<GalleryPhoto> {
        let limiter = (self.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        let mut tasks = JoinSet::new();
        for (index, source) in sources.iter().cloned().enumerate() {
            let pipeline = self.clone();
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                (index, pipeline.build_gallery_photo(&source).await)
            });
        }

        let mut results = Vec::with_capacity(sources.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("Gallery task did not complete: {e}"),
            }
        }
        results.sort_by_key(|(index, _)| *index);

        let photos: Vec<GalleryPhoto> = results
            .into_iter()
            .filter_map(|(_, result)| match result {
                Ok(photo) => Some(photo),
                Err(e) => {
                    log::warn!("Dropping photo from gallery: {e}");
                    None
                }
            })
            .collect();

        log::info!("Built {} of {} gallery photos", photos.len(), sources.len());
        order_gallery(photos)
    }
}

/// Order photos for display: ascending by capture date, undated photos
/// last. Stable, so ties and undated photos keep their input order.
///
/// # Example
///
/// ```rust
/// use tripshot::pipeline::order_gallery;
///
/// assert!(order_gallery(Vec::new()).is_empty());
/// ```
pub fn order_gallery(mut photos: Vec<GalleryPhoto>) -> Vec<GalleryPhoto> {
    photos.sort_by_key(|p| {
        let date = p.metadata.capture_date;
        (date.is_none(), date)
    });
    photos
}

/// `IMG_0042.HEIC` → `IMG_0042.jpg`, from the last path segment of the source.
fn converted_name(source: &PhotoSource) -> String {
    let id = source.identifier();
    let last = id
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let stem = last.rsplit_once('.').map_or(last, |(stem, _)| stem);
    if stem.is_empty() {
        "photo.jpg".to_string()
    } else {
        format!("{stem}.jpg")
    }
}

/// Collect photo files from the given paths.
///
/// Directories are walked recursively (following symlinks) for JPEG and
/// HEIC/HEIF extensions. Explicit file paths are kept whatever their
/// extension, since the format is decided by content.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            images.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
