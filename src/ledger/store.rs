use std::path::Path;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};

use crate::draft::{DraftDocument, DraftKey};

use super::error::Result;
use super::partitions::{decode_draft_key, draft_prefix, encode_draft_key};

/// Durable store for small structured draft state
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Overwrite the whole document for `key`
    async fn save(&self, key: &DraftKey, document: &DraftDocument) -> Result<()>;

    async fn load(&self, key: &DraftKey) -> Result<Option<DraftDocument>>;

    /// Remove the document; a missing key is not an error
    async fn clear(&self, key: &DraftKey) -> Result<()>;
}

/// Fjall-backed metadata store
#[derive(Clone)]
pub struct FjallMetadataStore {
    keyspace: Keyspace,
    drafts: PartitionHandle,
}

impl FjallMetadataStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening draft store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let drafts = keyspace.open_partition("drafts", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, drafts })
    }

    /// Every draft key currently stored
    pub fn list(&self) -> Result<Vec<DraftKey>> {
        let mut keys = Vec::new();
        for item in self.drafts.prefix(draft_prefix()) {
            let (key, _) = item?;
            if let Some(draft_key) = decode_draft_key(&key) {
                keys.push(draft_key);
            }
        }
        Ok(keys)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut draft_count = 0;
        let mut total_bytes = 0;

        for item in self.drafts.prefix(draft_prefix()) {
            let (_, value) = item?;
            draft_count += 1;
            total_bytes += value.len();
        }

        Ok(StoreStats {
            draft_count,
            total_bytes,
        })
    }
}

#[async_trait]
impl MetadataStore for FjallMetadataStore {
    async fn save(&self, key: &DraftKey, document: &DraftDocument) -> Result<()> {
        let value = serde_json::to_vec(document)?;
        let size = value.len();
        self.drafts.insert(encode_draft_key(key), value)?;
        self.keyspace.persist(PersistMode::SyncData)?;
        debug!(draft_key = %key, size, "Saved draft");
        Ok(())
    }

    async fn load(&self, key: &DraftKey) -> Result<Option<DraftDocument>> {
        match self.drafts.get(encode_draft_key(key))? {
            Some(value) => {
                let document = serde_json::from_slice(&value)?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, key: &DraftKey) -> Result<()> {
        self.drafts.remove(encode_draft_key(key))?;
        self.keyspace.persist(PersistMode::SyncData)?;
        debug!(draft_key = %key, "Cleared draft");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub draft_count: usize,
    pub total_bytes: usize,
}
