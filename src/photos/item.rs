use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::preview::PreviewHandle;
use crate::draft::{ItemKey, PhotoId, PhotoRef, Stage};

/// A file picked by the technician, before it is attached
#[derive(Debug, Clone, bon::Builder)]
pub struct PhotoFile {
    #[builder(into)]
    pub name: String,
    #[builder(into)]
    pub bytes: Bytes,
    /// Declared content type; guessed from the extension when absent
    #[builder(into)]
    pub mime_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Raw payload plus the file facts needed to upload it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoBlob {
    pub bytes: Bytes,
    pub name: String,
    pub mime_type: String,
}

/// In-memory photo as the form sees it
///
/// Pending items carry a payload but no [`PhotoRef`] (the blob store refused
/// it). Durable items carry both. The preview handle is a resource, not data:
/// it is released when the item is removed, replaced or dropped.
#[derive(Debug)]
pub struct PhotoItem {
    pub id: PhotoId,
    pub item: ItemKey,
    pub stage: Stage,
    pub payload: Option<PhotoBlob>,
    pub remark: String,
    pub photo_ref: Option<PhotoRef>,
    preview: Option<PreviewHandle>,
}

impl PhotoItem {
    pub(crate) fn new(
        id: PhotoId,
        item: ItemKey,
        stage: Stage,
        payload: PhotoBlob,
        photo_ref: Option<PhotoRef>,
        preview: PreviewHandle,
    ) -> Self {
        let remark = photo_ref
            .as_ref()
            .and_then(|r| r.remark.clone())
            .unwrap_or_default();

        Self {
            id,
            item,
            stage,
            payload: Some(payload),
            remark,
            photo_ref,
            preview: Some(preview),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.photo_ref.is_some()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .map(|p| p.name.as_str())
            .or_else(|| self.photo_ref.as_ref().map(|r| r.original_name.as_str()))
    }

    pub fn byte_size(&self) -> u64 {
        self.payload
            .as_ref()
            .map(|p| p.bytes.len() as u64)
            .or_else(|| self.photo_ref.as_ref().map(|r| r.byte_size))
            .unwrap_or(0)
    }

    /// Update the remark on the item and on its durable reference
    pub fn set_remark(&mut self, remark: impl Into<String>) {
        let remark = remark.into();
        if let Some(photo_ref) = self.photo_ref.as_mut() {
            photo_ref.remark = (!remark.is_empty()).then(|| remark.clone());
        }
        self.remark = remark;
    }

    /// Release the preview handle now instead of at drop
    pub fn release_preview(&mut self) {
        if let Some(handle) = self.preview.take() {
            handle.release();
        }
    }

    pub(crate) fn attach_ref(&mut self, mut photo_ref: PhotoRef) {
        photo_ref.remark = (!self.remark.is_empty()).then(|| self.remark.clone());
        self.photo_ref = Some(photo_ref);
    }
}
