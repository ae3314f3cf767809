//! # tripshot
//!
//! Trip photo gallery pipeline: fetch photos from URLs, files, or memory,
//! convert HEIC to displayable JPEG, read capture date and GPS location from
//! EXIF/XMP, and order the gallery chronologically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tripshot::config::Config;
//! use tripshot::pipeline::Pipeline;
//! use tripshot::source::PhotoSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let pipeline = Pipeline::from_config(&config)?;
//!
//!     let sources = vec![
//!         PhotoSource::url("https://example.com/jeju/day1.jpg"),
//!         PhotoSource::file("./photos/IMG_0042.HEIC"),
//!     ];
//!
//!     // Unfetchable photos are left out; undated ones go last.
//!     for photo in pipeline.build_gallery(&sources).await {
//!         println!(
//!             "{} {:?} {:?}",
//!             photo.original_source,
//!             photo.metadata.capture_date,
//!             photo.metadata.location,
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! ```rust,no_run
//! use tripshot::exif;
//! use tripshot::sniff::{ImageKind, sniff_bytes};
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! assert_eq!(sniff_bytes(&bytes, None), ImageKind::Jpeg);
//!
//! // Unreadable metadata reads as absent...
//! let meta = exif::extract(&bytes);
//! // ...unless you ask for the difference.
//! if let Err(e) = exif::try_extract(&bytes) {
//!     eprintln!("corrupt metadata: {e}");
//! }
//! println!("{:?}", meta.capture_date);
//! ```
//!
//! ## Modules
//!
//! - [`source`]: photo sources, fetched buffers, trip groups
//! - [`fetch`]: HTTP and filesystem fetching
//! - [`sniff`]: JPEG/HEIC detection from magic bytes
//! - [`heic`]: HEIC → JPEG conversion
//! - [`exif`]: capture date and GPS extraction
//! - [`pipeline`]: per-photo assembly, gallery batches, ordering
//! - [`session`]: displayed gallery with stale-result discarding
//! - [`config`]: configuration loading/saving

pub mod config;
pub mod exif;
pub mod fetch;
pub mod heic;
pub mod pipeline;
pub mod session;
pub mod sniff;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use exif::PhotoMetadata;
pub use pipeline::{GalleryPhoto, Pipeline, order_gallery};
pub use source::PhotoSource;
