//! Photo attachments: blob-backed payloads, durable references and previews
//!
//! [`PhotoManager`] sits between the form's in-memory [`PhotoItem`]s and the
//! two stores. Payloads go to the [`BlobStore`](crate::storage::BlobStore);
//! only [`PhotoRef`](crate::draft::PhotoRef)s ever reach the draft document.
//!
//! Ordering rule: a blob is deleted before its reference is dropped, and a
//! failed delete keeps the reference. Rehydration tolerates a missing blob by
//! dropping that one photo, so a stale reference is always recoverable while a
//! dangling one is not.

mod item;
mod manager;
mod preview;

pub use item::{PhotoBlob, PhotoFile, PhotoItem};
pub use manager::{AttachOutcome, PhotoManager, Rehydrated};
pub use preview::{PreviewHandle, PreviewRegistry};

use thiserror::Error;

use crate::draft::PhotoId;
use crate::storage::BlobError;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("not an image: {name} ({mime_type})")]
    NotAnImage { name: String, mime_type: String },

    #[error("photo is empty: {0}")]
    Empty(String),

    #[error("photo not found: {0}")]
    NotFound(PhotoId),

    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
}

pub type Result<T> = std::result::Result<T, PhotoError>;
