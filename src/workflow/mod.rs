//! Two-stage report workflow: `pre -> post -> submitted`
//!
//! [`StageWorkflow`] holds the one authoritative transition function. Guard
//! failures come back as [`Transition::Refused`] or
//! [`SubmitOutcome::Blocked`] values carrying the unmet items; only I/O
//! failures are errors.

mod nav;

pub use nav::{EntryMode, NavState};

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::autosave::{DiscardReport, DraftController};
use crate::draft::{DraftKey, FormState, ItemKey, Stage};
use crate::gate::{ChecklistSchema, CompletenessGate, StageReport};
use crate::photos::{PhotoError, PhotoItem};
use crate::remote::{
    PhotoUpload, RemoteError, ReportApi, SubmitReceipt, SubmitRequest, UploadedPhoto,
};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("cannot submit from state {0:?}")]
    WrongState(WorkflowState),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("photo payload unavailable: {0}")]
    Photo(#[from] PhotoError),
}

pub type Result<T> = std::result::Result<T, SubmitError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Active(Stage),
    Submitted,
}

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Moved(Stage),
    /// Guard failed; the stage did not change
    Refused(StageReport),
    /// Post-edit workflows cannot return to `pre`
    BackwardLocked,
    Unchanged,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Accepted remotely. `discard` is `None` when the local purge failed,
    /// which leaves a stale draft but never a lost report.
    Submitted {
        receipt: SubmitReceipt,
        discard: Option<DiscardReport>,
    },
    Blocked(StageReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWorkflow {
    mode: EntryMode,
    state: WorkflowState,
}

impl StageWorkflow {
    pub fn fresh() -> Self {
        Self {
            mode: EntryMode::Fresh,
            state: WorkflowState::Active(Stage::Pre),
        }
    }

    pub fn post_edit() -> Self {
        Self {
            mode: EntryMode::PostEdit,
            state: WorkflowState::Active(Stage::Post),
        }
    }

    /// Rebuild from navigation state after a reload
    ///
    /// A fresh workflow asking for `post` gets it only if the `pre` guard
    /// still holds; otherwise it lands on `pre` and the refusal is returned.
    pub fn resume(nav: NavState, schema: &ChecklistSchema, form: &FormState) -> (Self, Transition) {
        match (nav.mode, nav.stage) {
            (EntryMode::PostEdit, _) => (Self::post_edit(), Transition::Unchanged),
            (EntryMode::Fresh, Stage::Pre) => (Self::fresh(), Transition::Unchanged),
            (EntryMode::Fresh, Stage::Post) => {
                let mut workflow = Self::fresh();
                let transition = workflow.advance(schema, form);
                if let Transition::Refused(report) = &transition {
                    warn!(missing = report.advance_blockers().len(), "Resume to post refused, back to pre");
                }
                (workflow, transition)
            }
        }
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn stage(&self) -> Option<Stage> {
        match self.state {
            WorkflowState::Active(stage) => Some(stage),
            WorkflowState::Submitted => None,
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.mode == EntryMode::Fresh && self.state == WorkflowState::Active(Stage::Post)
    }

    pub fn nav(&self) -> NavState {
        NavState {
            stage: self.stage().unwrap_or(Stage::Post),
            mode: self.mode,
        }
    }

    /// `pre -> post`, guarded by the `pre` photo and measurement checks
    pub fn advance(&mut self, schema: &ChecklistSchema, form: &FormState) -> Transition {
        if self.state != WorkflowState::Active(Stage::Pre) {
            return Transition::Unchanged;
        }

        let report = CompletenessGate::new(schema).evaluate(Stage::Pre, form);
        if !report.can_advance() {
            return Transition::Refused(report);
        }

        self.state = WorkflowState::Active(Stage::Post);
        Transition::Moved(Stage::Post)
    }

    /// `post -> pre`, fresh workflows only
    pub fn back(&mut self) -> Transition {
        if self.mode == EntryMode::PostEdit {
            return Transition::BackwardLocked;
        }
        if self.state != WorkflowState::Active(Stage::Post) {
            return Transition::Unchanged;
        }

        self.state = WorkflowState::Active(Stage::Pre);
        Transition::Moved(Stage::Pre)
    }

    /// `post -> submitted`
    ///
    /// Checks the `post` guard, uploads photos stage by stage, submits, and
    /// only after the backend accepts the report discards the local draft.
    /// Any remote failure leaves the workflow in `post` with the draft intact.
    pub async fn submit(
        &mut self,
        api: &dyn ReportApi,
        controller: &DraftController,
        key: &DraftKey,
        schema: &ChecklistSchema,
        form: &FormState,
    ) -> Result<SubmitOutcome> {
        if self.state != WorkflowState::Active(Stage::Post) {
            return Err(SubmitError::WrongState(self.state));
        }

        let report = CompletenessGate::new(schema).evaluate(Stage::Post, form);
        if !report.can_submit() {
            return Ok(SubmitOutcome::Blocked(report));
        }

        let mut uploaded = Vec::new();
        for (stage, photos) in uploads_by_stage(controller, form).await? {
            let count: usize = photos.values().map(Vec::len).sum();
            let mut stage_uploads = api.upload_photos(key, stage, photos).await?;
            info!(draft_key = %key, %stage, count, "Photos uploaded");
            uploaded.append(&mut stage_uploads);
        }

        let request = SubmitRequest::new(form.snapshot(), uploaded);
        let receipt = api.submit(key, &request).await?;
        self.state = WorkflowState::Submitted;
        info!(draft_key = %key, report_id = %receipt.report_id, "Report submitted");

        let discard = match controller.discard(key, &form.photo_ids()).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(draft_key = %key, error = %e, "Submitted but local draft not purged");
                None
            }
        };

        Ok(SubmitOutcome::Submitted { receipt, discard })
    }
}

type StageUploads = BTreeMap<Stage, BTreeMap<ItemKey, Vec<PhotoUpload>>>;

async fn uploads_by_stage(controller: &DraftController, form: &FormState) -> Result<StageUploads> {
    let mut grouped = StageUploads::new();
    for (item, photos) in &form.photos {
        for photo in photos {
            let upload = upload_for(controller, photo).await?;
            grouped
                .entry(photo.stage)
                .or_default()
                .entry(item.clone())
                .or_default()
                .push(upload);
        }
    }
    Ok(grouped)
}

/// Payload from memory, or from the blob store when only the ref is held
async fn upload_for(controller: &DraftController, photo: &PhotoItem) -> Result<PhotoUpload> {
    if let Some(payload) = &photo.payload {
        return Ok(PhotoUpload {
            photo_id: photo.id.clone(),
            file_name: payload.name.clone(),
            mime_type: payload.mime_type.clone(),
            remark: photo.remark.clone(),
            bytes: payload.bytes.clone(),
        });
    }

    let photo_ref = photo
        .photo_ref
        .as_ref()
        .ok_or_else(|| PhotoError::NotFound(photo.id.clone()))?;
    let bytes = controller
        .photos()
        .blobs()
        .get(&photo_ref.storage_key)
        .await
        .map_err(PhotoError::from)?
        .ok_or_else(|| PhotoError::NotFound(photo.id.clone()))?;

    Ok(PhotoUpload {
        photo_id: photo.id.clone(),
        file_name: photo_ref.original_name.clone(),
        mime_type: photo_ref.mime_type.clone(),
        remark: photo.remark.clone(),
        bytes,
    })
}

/// Photos the backend acknowledged, by slot
pub fn uploaded_by_item(uploaded: &[UploadedPhoto]) -> BTreeMap<&ItemKey, Vec<&UploadedPhoto>> {
    let mut by_item: BTreeMap<&ItemKey, Vec<&UploadedPhoto>> = BTreeMap::new();
    for photo in uploaded {
        by_item.entry(&photo.item).or_default().push(photo);
    }
    by_item
}
