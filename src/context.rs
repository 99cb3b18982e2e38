use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::autosave::{AutosaveSettings, Autosaver, DraftController};
use crate::config::Config;
use crate::draft::{DraftDocument, DraftKey, KeyError};
use crate::gate::{ChecklistSchema, SchemaError};
use crate::ledger::{FjallMetadataStore, LedgerError};
use crate::photos::{PhotoManager, PreviewRegistry};
use crate::storage::{BlobError, ObjectBlobStore};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("metadata store: {0}")]
    Ledger(#[from] LedgerError),

    #[error("blob store: {0}")]
    Blob(#[from] BlobError),

    #[error("draft key: {0}")]
    Key(#[from] KeyError),

    #[error("checklist: {0}")]
    Schema(#[from] SchemaError),

    #[error("no checklist given and drafts.default_checklist is unset")]
    NoChecklist,
}

/// Opened stores plus the controller wired over them
#[derive(Clone)]
pub struct DraftContext {
    pub config: Arc<Config>,
    pub metadata: Arc<FjallMetadataStore>,
    pub blobs: Arc<ObjectBlobStore>,
    pub controller: Arc<DraftController>,
}

impl DraftContext {
    pub fn open(config: Config) -> Result<Self, ContextError> {
        let metadata = Arc::new(FjallMetadataStore::open(&config.storage.metadata_path)?);
        let blobs = Arc::new(ObjectBlobStore::from_config(&config.storage)?);
        let photos = Arc::new(PhotoManager::new(blobs.clone(), PreviewRegistry::new()));
        let controller = Arc::new(DraftController::new(metadata.clone(), photos));

        Ok(Self {
            config: Arc::new(config),
            metadata,
            blobs,
            controller,
        })
    }

    pub fn draft_key(&self, station: &str, report: Option<&str>) -> Result<DraftKey, KeyError> {
        DraftKey::derive(&self.config.drafts.key_prefix, station, report)
    }

    /// Start autosaving `key` with the configured debounce
    pub fn autosaver(&self, key: DraftKey, initial: DraftDocument) -> Autosaver {
        let settings = AutosaveSettings::from(&self.config.autosave);
        Autosaver::spawn(self.controller.clone(), key, settings, initial)
    }

    /// The given checklist, or the configured default
    pub fn checklist(&self, explicit: Option<&Path>) -> Result<ChecklistSchema, ContextError> {
        let path = explicit
            .or(self.config.drafts.default_checklist.as_deref())
            .ok_or(ContextError::NoChecklist)?;
        Ok(ChecklistSchema::load(path)?)
    }
}
