//! The gallery currently on screen, and which batch is allowed to replace it.
//!
//! Every [`GallerySession::load`] starts a new generation. When its batch
//! finishes, the result is applied only if no newer load or
//! [`cancel`](GallerySession::cancel) happened in the meantime; otherwise it
//! is dropped and the displayed gallery is left alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::pipeline::{GalleryPhoto, Pipeline};
use crate::source::{Group, PhotoSource};

/// What happened to a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The batch became the displayed gallery, with this many photos.
    Applied(usize),
    /// A newer load or a cancel superseded the batch; its result was discarded.
    Stale,
}

#[derive(Default)]
struct Displayed {
    group_id: Option<u64>,
    photos: Vec<GalleryPhoto>,
}

pub struct GallerySession {
    pipeline: Pipeline,
    generation: AtomicU64,
    displayed: Mutex<Displayed>,
}

impl GallerySession {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            generation: AtomicU64::new(0),
            displayed: Mutex::new(Displayed::default()),
        }
    }

    /// Build the gallery of `group` and display it unless superseded.
    pub async fn load(&self, group: &Group) -> LoadOutcome {
        log::info!("Loading gallery for group {} ({})", group.id, group.name);
        self.run(Some(group.id), &group.photo_sources()).await
    }

    /// Like [`load`](Self::load), for a bare list of sources.
    pub async fn load_sources(&self, sources: &[PhotoSource]) -> LoadOutcome {
        self.run(None, sources).await
    }

    async fn run(&self, group_id: Option<u64>, sources: &[PhotoSource]) -> LoadOutcome {
        let generation = {
            let _guard = self.displayed();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let photos = self.pipeline.build_gallery(sources).await;

        // Check and apply under the same lock `cancel` takes.
        let mut displayed = self.displayed();
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Discarding gallery batch {generation}: superseded");
            return LoadOutcome::Stale;
        }
        let count = photos.len();
        *displayed = Displayed { group_id, photos };
        LoadOutcome::Applied(count)
    }

    /// Invalidate every batch still in flight. The displayed gallery stays.
    pub fn cancel(&self) {
        let _guard = self.displayed();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Gallery loads before generation {generation} cancelled");
    }

    /// Snapshot of the displayed gallery, in display order.
    pub fn photos(&self) -> Vec<GalleryPhoto> {
        self.displayed().photos.clone()
    }

    /// One already-resolved photo, for handing to a detail view.
    pub fn photo(&self, index: usize) -> Option<GalleryPhoto> {
        self.displayed().photos.get(index).cloned()
    }

    /// Group whose gallery is displayed, if it came from [`load`](Self::load).
    pub fn group_id(&self) -> Option<u64> {
        self.displayed().group_id
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn displayed(&self) -> MutexGuard<'_, Displayed> {
        self.displayed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
