use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Result;
use crate::draft::{DraftDocument, DraftKey, FormState, PhotoId};
use crate::ledger::MetadataStore;
use crate::photos::PhotoManager;

/// A prior session, ready to splice into the form
#[derive(Debug)]
pub struct RestoredState {
    pub form: FormState,
    /// Photos whose blob could not be found; their references were dropped
    pub dropped: Vec<PhotoId>,
}

/// What `discard` managed to remove
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiscardReport {
    pub blobs_deleted: usize,
    pub blobs_failed: Vec<PhotoId>,
    pub metadata_cleared: bool,
}

/// Saves, restores and purges drafts across the two stores
pub struct DraftController {
    metadata: Arc<dyn MetadataStore>,
    photos: Arc<PhotoManager>,
}

impl DraftController {
    pub fn new(metadata: Arc<dyn MetadataStore>, photos: Arc<PhotoManager>) -> Self {
        Self { metadata, photos }
    }

    pub fn photos(&self) -> &Arc<PhotoManager> {
        &self.photos
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    /// Write a snapshot as the draft's new recovery point
    ///
    /// Returns whether it was saved. A failure is logged and swallowed: the
    /// in-memory form stays authoritative and the previous saved snapshot
    /// remains the recovery point.
    pub async fn flush(&self, key: &DraftKey, snapshot: &DraftDocument) -> bool {
        match self.metadata.save(key, snapshot).await {
            Ok(()) => {
                debug!(draft_key = %key, photos = snapshot.photo_count(), "Draft autosaved");
                true
            }
            Err(e) => {
                warn!(draft_key = %key, error = %e, "Autosave failed, keeping in-memory state");
                false
            }
        }
    }

    /// Load a prior draft and rehydrate its photos
    ///
    /// `None` means start with an empty form. An unreadable document is
    /// logged and treated the same way rather than blocking the form.
    pub async fn restore(&self, key: &DraftKey) -> Option<RestoredState> {
        let document = match self.metadata.load(key).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!(draft_key = %key, "No prior draft");
                return None;
            }
            Err(e) => {
                warn!(draft_key = %key, error = %e, "Stored draft unreadable, starting empty");
                return None;
            }
        };

        let rehydrated = self.photos.rehydrate(key, &document.photo_refs).await;
        info!(
            draft_key = %key,
            answers = document.answers.len(),
            photos = document.photo_count() - rehydrated.dropped.len(),
            dropped = rehydrated.dropped.len(),
            "Draft restored"
        );

        Some(RestoredState {
            form: FormState::from_parts(document, rehydrated.photos),
            dropped: rehydrated.dropped,
        })
    }

    /// Purge a draft after the report was accepted remotely
    ///
    /// Blobs go first, each best-effort. The metadata entry is cleared only if
    /// every blob delete succeeded, so an interrupted or partial discard leaves
    /// orphaned blobs or a still-loadable draft, never references to deleted
    /// payloads.
    pub async fn discard(&self, key: &DraftKey, photo_ids: &[PhotoId]) -> Result<DiscardReport> {
        let mut report = DiscardReport::default();

        for id in photo_ids {
            match self.photos.blobs().delete(&key.storage_key(id)).await {
                Ok(()) => report.blobs_deleted += 1,
                Err(e) => {
                    warn!(draft_key = %key, photo_id = %id, error = %e, "Blob delete failed during discard");
                    report.blobs_failed.push(id.clone());
                }
            }
        }

        if !report.blobs_failed.is_empty() {
            warn!(
                draft_key = %key,
                failed = report.blobs_failed.len(),
                "Keeping draft metadata until every blob is gone"
            );
            return Ok(report);
        }

        self.metadata.clear(key).await?;
        report.metadata_cleared = true;
        info!(draft_key = %key, blobs = report.blobs_deleted, "Draft discarded");
        Ok(report)
    }
}
