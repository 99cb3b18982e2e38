//! Blob storage for photo payloads
//! Uses Apache Arrow object_store crate (local filesystem or in-memory)

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};
use crate::humanize::ByteSize;

mod flaky;

pub use flaky::{FlakyBlobStore, PutFailure};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Local photo storage is full: {0}")]
    QuotaExceeded(String),

    #[error("Local photo storage unavailable: {0}")]
    Unavailable(String),

    #[error("Photo of {size} exceeds the {limit} limit")]
    TooLarge { size: ByteSize, limit: ByteSize },

    #[error("Object store error: {0}")]
    Backend(object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobError {
    /// True when the photo simply could not be kept on this device.
    ///
    /// Callers keep the photo in memory and tell the user it was not saved
    /// locally; the rest of the form carries on.
    pub fn is_local_storage_failure(&self) -> bool {
        matches!(self, BlobError::QuotaExceeded(_) | BlobError::Unavailable(_))
    }
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        if is_storage_full(&err) {
            return BlobError::QuotaExceeded(err.to_string());
        }
        match err {
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. }
            | object_store::Error::NotImplemented => BlobError::Unavailable(err.to_string()),
            other => BlobError::Backend(other),
        }
    }
}

fn is_storage_full(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::StorageFull {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Storage result type
pub type Result<T> = std::result::Result<T, BlobError>;

/// Durable key/value store for binary photo payloads
///
/// Missing keys are not errors: `get` returns `None` and `delete` succeeds.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Blob store wrapping any object_store backend
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    max_blob_bytes: ByteSize,
}

impl ObjectBlobStore {
    /// Create new blob store with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, max_blob_bytes: ByteSize) -> Self {
        Self {
            store,
            max_blob_bytes,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            StorageConfig::default().max_photo_bytes,
        )
    }

    /// Blob store rooted at a local directory (created if missing)
    pub fn local(root: impl AsRef<Path>, max_blob_bytes: ByteSize) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        tracing::info!(root = %root.display(), "Opened local photo store");
        Ok(Self::new(Arc::new(store), max_blob_bytes))
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Local => Self::local(&config.blob_root, config.max_photo_bytes),
            StorageProvider::Memory => Ok(Self::new(
                Arc::new(object_store::memory::InMemory::new()),
                config.max_photo_bytes,
            )),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let size = data.len() as u64;
        if size > self.max_blob_bytes.as_u64() {
            return Err(BlobError::TooLarge {
                size: ByteSize(size),
                limit: self.max_blob_bytes,
            });
        }

        let path = StoragePath::from(key);
        self.store.put(&path, data.into()).await?;

        tracing::debug!(key, size, "Stored photo blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let bytes = result.bytes().await?;
        tracing::debug!(key, size = bytes.len(), "Loaded photo blob");
        Ok(Some(bytes))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = StoragePath::from(key);

        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                tracing::debug!(key, "Deleted photo blob");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
