use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use crate::draft::PhotoId;

/// Issues displayable handles for photo payloads and counts the live ones
///
/// A handle stands in for a browser object URL: cheap to hand to a view,
/// but it pins its payload until released.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: AtomicU64,
    live: AtomicUsize,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire a handle over `payload`
    pub fn acquire(self: &Arc<Self>, photo_id: &PhotoId, payload: Bytes) -> PreviewHandle {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let live = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(photo_id = %photo_id, handle = n, live, "Preview handle acquired");

        PreviewHandle {
            uri: format!("preview://{n}"),
            photo_id: photo_id.clone(),
            payload,
            registry: Arc::clone(self),
            released: false,
        }
    }

    /// Number of handles acquired and not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Displayable handle for one photo; released exactly once
///
/// Release happens on [`PreviewHandle::release`] or, failing that, on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    uri: String,
    photo_id: PhotoId,
    payload: Bytes,
    registry: Arc<PreviewRegistry>,
    released: bool,
}

impl PreviewHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn photo_id(&self) -> &PhotoId {
        &self.photo_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let live = self.registry.live.fetch_sub(1, Ordering::AcqRel) - 1;
        debug!(photo_id = %self.photo_id, uri = %self.uri, live, "Preview handle released");
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}
