//! Contract with the reporting backend
//!
//! The backend's wire format is not modelled here. [`ReportApi`] is the narrow
//! surface the workflow needs: upload photos for one stage, then submit the
//! structured report referencing the uploaded photos.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::draft::{Answer, DraftDocument, DraftKey, ItemKey, Measurement, PhotoId, Stage};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// One photo payload on its way to the backend
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub photo_id: PhotoId,
    pub file_name: String,
    pub mime_type: String,
    pub remark: String,
    pub bytes: Bytes,
}

/// Backend identifier for an uploaded photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedPhoto {
    pub photo_id: PhotoId,
    pub item: ItemKey,
    pub stage: Stage,
    pub remote_id: String,
    pub url: Option<String>,
}

/// Structured report body; photos are referenced, never inlined
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub answers: BTreeMap<ItemKey, Answer>,
    pub measurements: BTreeMap<String, BTreeMap<String, Measurement>>,
    pub free_text: BTreeMap<String, String>,
    pub flags: BTreeMap<String, bool>,
    pub photos: Vec<UploadedPhoto>,
}

impl SubmitRequest {
    pub fn new(document: DraftDocument, photos: Vec<UploadedPhoto>) -> Self {
        Self {
            answers: document.answers,
            measurements: document.measurements,
            free_text: document.free_text,
            flags: document.flags,
            photos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub report_id: String,
}

#[async_trait]
pub trait ReportApi: Send + Sync {
    /// Upload one stage's photos, grouped by checklist slot
    async fn upload_photos(
        &self,
        key: &DraftKey,
        stage: Stage,
        photos: BTreeMap<ItemKey, Vec<PhotoUpload>>,
    ) -> Result<Vec<UploadedPhoto>>;

    /// Submit the report; must be safe to retry after a transient failure
    async fn submit(&self, key: &DraftKey, request: &SubmitRequest) -> Result<SubmitReceipt>;
}

/// In-process backend that records calls, for development and tests
#[derive(Debug, Default)]
pub struct RecordingApi {
    state: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    uploads: Vec<(Stage, Vec<UploadedPhoto>)>,
    submissions: Vec<SubmitRequest>,
    failing_uploads: usize,
    failing_submits: usize,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` upload calls with a transport error
    pub fn fail_next_uploads(&self, n: usize) {
        self.lock().failing_uploads = n;
    }

    /// Fail the next `n` submit calls with a transport error
    pub fn fail_next_submits(&self, n: usize) {
        self.lock().failing_submits = n;
    }

    pub fn uploads(&self) -> Vec<(Stage, Vec<UploadedPhoto>)> {
        self.lock().uploads.clone()
    }

    pub fn submissions(&self) -> Vec<SubmitRequest> {
        self.lock().submissions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReportApi for RecordingApi {
    async fn upload_photos(
        &self,
        key: &DraftKey,
        stage: Stage,
        photos: BTreeMap<ItemKey, Vec<PhotoUpload>>,
    ) -> Result<Vec<UploadedPhoto>> {
        let mut state = self.lock();
        if state.failing_uploads > 0 {
            state.failing_uploads -= 1;
            return Err(RemoteError::Transport("upload connection reset".to_string()));
        }

        let uploaded: Vec<_> = photos
            .into_iter()
            .flat_map(|(item, files)| {
                files.into_iter().map(move |file| UploadedPhoto {
                    remote_id: format!("{stage}/{}", file.photo_id),
                    url: None,
                    photo_id: file.photo_id,
                    item: item.clone(),
                    stage,
                })
            })
            .collect();

        tracing::info!(draft_key = %key, %stage, count = uploaded.len(), "Recorded photo upload");
        state.uploads.push((stage, uploaded.clone()));
        Ok(uploaded)
    }

    async fn submit(&self, key: &DraftKey, request: &SubmitRequest) -> Result<SubmitReceipt> {
        let mut state = self.lock();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(RemoteError::Transport("submit timed out".to_string()));
        }

        state.submissions.push(request.clone());
        let report_id = format!("report-{}", state.submissions.len());
        tracing::info!(draft_key = %key, %report_id, photos = request.photos.len(), "Recorded submission");
        Ok(SubmitReceipt { report_id })
    }
}
